use crate::api::AppState;
use crate::error::{AppError, Result};
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use uuid::Uuid;

/// Upgrades a browser connection for the given channel. The channel is
/// validated before the upgrade so a bad URL gets a proper error response
/// instead of a dead socket.
pub async fn connect(
    ws: WebSocketUpgrade,
    Path(channel_uuid): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response> {
    let channel = state.store.channel(channel_uuid).await.map_err(|e| match e {
        AppError::NotFound => AppError::BadRequest("no such channel".to_string()),
        other => other,
    })?;

    let gateway = state.gateway.clone();
    let shutdown_rx = state.shutdown_rx.clone();

    Ok(ws.on_upgrade(move |socket| async move {
        gateway.handle_socket(socket, channel, shutdown_rx).await;
    }))
}
