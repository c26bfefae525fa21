#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations,
    dead_code
)]

use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;
use wicket_server::adapters::redis::RedisClient;
use wicket_server::domain::{Channel, ChatId, Contact, MsgId, MsgStatus};
use wicket_server::services::Router;

/// Connects to the test coordination store.
pub async fn redis_client() -> RedisClient {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string());
    RedisClient::connect(&url).await.expect("Failed to connect to Redis. Is it running?")
}

/// A unique key base per test so parallel tests never share keys.
pub fn test_key_base() -> String {
    format!("wickettest:{}", Uuid::new_v4().simple())
}

pub const CHANNEL_UUID: &str = "8291264a-4581-4d12-96e5-e9fcfa6e68d9";

pub fn channel_uuid() -> Uuid {
    Uuid::parse_str(CHANNEL_UUID).unwrap()
}

/// Records router notifications instead of making HTTP calls.
#[derive(Debug, Default)]
pub struct MockRouter {
    pub calls: Mutex<Vec<String>>,
}

impl MockRouter {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Router for MockRouter {
    async fn start_chat(&self, channel: &Channel, chat_id: &ChatId) -> anyhow::Result<()> {
        self.record(format!("StartChat({}, {chat_id})", channel.uuid));
        Ok(())
    }

    async fn create_msg(
        &self,
        channel: &Channel,
        contact: &Contact,
        text: &str,
        _attachments: &[String],
    ) -> anyhow::Result<()> {
        self.record(format!("CreateMsg({}, {}, '{text}')", channel.uuid, contact.id));
        Ok(())
    }

    async fn report_status(
        &self,
        channel_uuid: Uuid,
        chat_id: &ChatId,
        msg_id: MsgId,
        status: MsgStatus,
    ) -> anyhow::Result<()> {
        let status = match status {
            MsgStatus::Delivered => "delivered",
            MsgStatus::Failed => "failed",
        };
        self.record(format!("ReportStatus({channel_uuid}, {chat_id}, {msg_id}, {status})"));
        Ok(())
    }
}
