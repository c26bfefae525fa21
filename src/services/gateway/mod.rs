pub mod registry;
pub(crate) mod session;

pub use registry::{ClientHandle, ClientRegistry};

use crate::config::WsConfig;
use crate::domain::Channel;
use crate::services::chat::ChatService;
use crate::services::gateway::session::Session;
use crate::services::store::Store;
use axum::extract::ws::WebSocket;
use opentelemetry::{
    global,
    metrics::{Counter, UpDownCounter},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) active_connections: UpDownCounter<i64>,
    pub(crate) commands_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("wicket-server");
        Self {
            active_connections: meter
                .i64_up_down_counter("websocket_active_connections")
                .with_description("Number of active WebSocket connections")
                .build(),
            commands_total: meter
                .u64_counter("websocket_commands_total")
                .with_description("Total client commands received")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a session around each accepted socket and runs it to completion.
#[derive(Clone, Debug)]
pub struct GatewayService {
    chats: ChatService,
    store: Store,
    registry: Arc<ClientRegistry>,
    config: WsConfig,
    metrics: Metrics,
}

impl GatewayService {
    #[must_use]
    pub fn new(chats: ChatService, store: Store, registry: Arc<ClientRegistry>, config: WsConfig) -> Self {
        Self { chats, store, registry, config, metrics: Metrics::new() }
    }

    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        channel: Channel,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        self.metrics.active_connections.add(1, &[]);

        let (events_tx, events_rx) = mpsc::channel(self.config.outbound_buffer_size);

        let session = Session {
            id: Uuid::new_v4(),
            channel,
            contact: None,
            chats: self.chats.clone(),
            store: self.store.clone(),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            events_tx,
            metrics: self.metrics.clone(),
        };

        session.run(socket, events_rx, shutdown_rx).await;

        self.metrics.active_connections.add(-1, &[]);
    }
}
