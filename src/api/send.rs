use crate::api::AppState;
use crate::domain::{ChatId, MsgId, MsgOrigin, MsgOut, MsgUser, UserId};
use crate::error::{AppError, Result};
use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub msg_id: MsgId,
    pub channel_uuid: Uuid,
    pub chat_id: ChatId,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub origin: MsgOrigin,
    pub user_id: Option<UserId>,
    pub secret: String,
}

/// Router-initiated send: authenticates against the channel secret, embeds
/// the authoring user snapshot and queues the message for delivery.
pub async fn send(State(state): State<AppState>, Json(payload): Json<SendRequest>) -> Result<Json<Value>> {
    let channel = state.store.channel(payload.channel_uuid).await.map_err(|e| match e {
        AppError::NotFound => AppError::BadRequest("no such channel".to_string()),
        other => other,
    })?;

    if channel.secret() != payload.secret {
        return Err(AppError::AuthError);
    }

    let contact = state.chats.load_contact(&channel, &payload.chat_id).await?;

    let user = match payload.user_id {
        Some(id) => {
            let user = state.store.user(id).await?;
            Some(MsgUser { id: user.id, name: user.name(), avatar: user.avatar })
        }
        None => None,
    };

    let msg = MsgOut {
        id: payload.msg_id,
        text: payload.text,
        attachments: payload.attachments,
        origin: payload.origin,
        user,
        time: OffsetDateTime::now_utc(),
    };

    state.chats.queue_msg(&channel, &contact.chat_id, msg).await;

    Ok(Json(json!({"status": "queued"})))
}
