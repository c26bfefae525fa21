use crate::config::RouterConfig;
use crate::domain::{Channel, ChatId, Contact, MsgId, MsgStatus};
use crate::services::store::Store;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// The external routing backend. It owns contacts, channels and long-term
/// message history; the gateway notifies it of client activity and reacts
/// to its send requests. Behind a trait so tests can record calls.
#[async_trait]
pub trait Router: Send + Sync + std::fmt::Debug {
    /// Announces a brand new conversation. The router creates the contact
    /// as a side effect.
    async fn start_chat(&self, channel: &Channel, chat_id: &ChatId) -> anyhow::Result<()>;

    /// Forwards a client-authored message.
    async fn create_msg(
        &self,
        channel: &Channel,
        contact: &Contact,
        text: &str,
        attachments: &[String],
    ) -> anyhow::Result<()>;

    /// Reports the delivery status of a router-authored message.
    async fn report_status(
        &self,
        channel_uuid: Uuid,
        chat_id: &ChatId,
        msg_id: MsgId,
        status: MsgStatus,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct MsgInBody<'a> {
    text: &'a str,
    attachments: &'a [String],
}

#[derive(Debug, Serialize)]
struct MsgStatusBody {
    msg_id: MsgId,
    status: MsgStatus,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RouterEvent<'a> {
    ChatStarted,
    MsgIn { msg: MsgInBody<'a> },
    MsgStatus { status: MsgStatusBody },
}

#[derive(Debug, Serialize)]
struct NotifyPayload<'a> {
    chat_id: &'a ChatId,
    secret: &'a str,
    events: Vec<RouterEvent<'a>>,
}

/// Synchronous HTTP notifications to the router. Every notification is
/// at-most-once: failures are reported to the caller, never retried here.
#[derive(Clone, Debug)]
pub struct HttpRouter {
    client: reqwest::Client,
    config: RouterConfig,
    store: Store,
}

impl HttpRouter {
    #[must_use]
    pub fn new(config: RouterConfig, store: Store) -> Self {
        Self { client: reqwest::Client::new(), config, store }
    }

    fn receive_url(&self, channel_uuid: Uuid) -> String {
        let proto = if self.config.ssl { "https" } else { "http" };
        format!("{proto}://{}/c/chp/{channel_uuid}/receive", self.config.domain)
    }

    async fn request(
        &self,
        channel_uuid: Uuid,
        payload: &NotifyPayload<'_>,
    ) -> anyhow::Result<()> {
        let url = self.receive_url(channel_uuid);
        let resp = self.client.post(&url).json(payload).send().await?;

        if !resp.status().is_success() {
            anyhow::bail!("router returned non-2XX status: {}", resp.status());
        }

        tracing::debug!(url = %url, status = %resp.status(), "Router notified");
        Ok(())
    }
}

#[async_trait]
impl Router for HttpRouter {
    async fn start_chat(&self, channel: &Channel, chat_id: &ChatId) -> anyhow::Result<()> {
        self.request(
            channel.uuid,
            &NotifyPayload { chat_id, secret: channel.secret(), events: vec![RouterEvent::ChatStarted] },
        )
        .await
    }

    async fn create_msg(
        &self,
        channel: &Channel,
        contact: &Contact,
        text: &str,
        attachments: &[String],
    ) -> anyhow::Result<()> {
        self.request(
            channel.uuid,
            &NotifyPayload {
                chat_id: &contact.chat_id,
                secret: channel.secret(),
                events: vec![RouterEvent::MsgIn { msg: MsgInBody { text, attachments } }],
            },
        )
        .await
    }

    async fn report_status(
        &self,
        channel_uuid: Uuid,
        chat_id: &ChatId,
        msg_id: MsgId,
        status: MsgStatus,
    ) -> anyhow::Result<()> {
        // The dispatcher only knows conversation keys; the cached lookup
        // supplies the channel secret.
        let channel = self.store.channel(channel_uuid).await.map_err(|e| anyhow::anyhow!(e))?;

        self.request(
            channel_uuid,
            &NotifyPayload {
                chat_id,
                secret: channel.secret(),
                events: vec![RouterEvent::MsgStatus { status: MsgStatusBody { msg_id, status } }],
            },
        )
        .await
    }
}
