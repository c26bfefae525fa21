#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;
use wicket_server::adapters::redis::{Outboxes, RedisClient};
use wicket_server::api::AppState;
use wicket_server::config::Config;
use wicket_server::services::gateway::ClientRegistry;
use wicket_server::services::{ChatService, GatewayService, HttpRouter, Router, Store};
use wicket_server::workers::DispatchWorker;
use wicket_server::{adapters, api, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot_server");
    let (listener, app, shutdown_tx, shutdown_rx, dispatcher) = async {
        // Phase 1: Infrastructure Setup (Resources)
        let pool = adapters::database::init_pool(&config.database_url).await?;
        tracing::info!("db ok");

        let redis = RedisClient::connect(&config.redis.url).await?;
        tracing::info!("redis ok");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_signal_handler(shutdown_tx.clone());

        // Phase 2: Component Wiring (Pure logic, no side effects)
        let outboxes = Arc::new(Outboxes::new(
            redis,
            config.redis.key_base.clone(),
            config.redis.instance_id.clone(),
        ));
        let store = Store::new(pool.clone(), Duration::from_secs(config.cache.ttl_secs));
        let router: Arc<dyn Router> = Arc::new(HttpRouter::new(config.router.clone(), store.clone()));
        let chats = ChatService::new(pool, Arc::clone(&router), Arc::clone(&outboxes));
        let registry = Arc::new(ClientRegistry::new());
        let gateway =
            GatewayService::new(chats.clone(), store.clone(), Arc::clone(&registry), config.websocket.clone());
        let dispatcher =
            DispatchWorker::new(outboxes, registry, router, config.dispatch.clone());

        // Phase 3: Runtime Setup (Listener and Router)
        let state = AppState { store, chats, gateway, shutdown_rx: shutdown_rx.clone() };
        let app = api::app_router(state);

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        tracing::info!(address = %addr, "listening");
        let listener = tokio::net::TcpListener::bind(addr).await?;

        Ok::<_, anyhow::Error>((listener, app, shutdown_tx, shutdown_rx, dispatcher))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Start Runtime (Explicit Spawning and Listening)
    let dispatch_task = tokio::spawn(dispatcher.run(shutdown_rx.clone()));

    let mut api_rx = shutdown_rx;
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = api_rx.wait_for(|&s| s).await;
    });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful Shutdown Orchestration
    let _ = shutdown_tx.send(true);
    tokio::select! {
        _ = dispatch_task => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Unable to install SIGTERM handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("Shutdown signal received, exiting");
        let _ = shutdown_tx.send(true);
    });
}
