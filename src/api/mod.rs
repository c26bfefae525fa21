pub mod gateway;
pub mod protocol;
pub mod send;

use crate::services::chat::ChatService;
use crate::services::gateway::GatewayService;
use crate::services::store::Store;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Store,
    pub chats: ChatService,
    pub gateway: GatewayService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

/// Configures and returns the application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/wc/connect/{channel_uuid}", get(gateway::connect))
        .route("/wc/send", post(send::send))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({"version": env!("CARGO_PKG_VERSION")}))
}
