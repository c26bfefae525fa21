use crate::adapters::database::{ContactRepository, DbPool, MessageRepository};
use crate::adapters::redis::{OutboxError, Outboxes};
use crate::domain::{Channel, ChatId, Contact, Conversation, ItemId, MsgId, MsgOut, MsgStatus, StoredMsg};
use crate::error::{AppError, Result};
use crate::services::router::Router;
use std::sync::Arc;
use time::OffsetDateTime;

/// Fixed page size for history loads.
pub const HISTORY_PAGE_SIZE: i64 = 25;

/// Conversation-level operations shared by sessions and the send endpoint.
///
/// Coordination-store calls made on the serving path degrade to logged
/// warnings when the store is unreachable: the gateway keeps serving live
/// traffic without cross-instance queuing rather than failing requests.
#[derive(Clone, Debug)]
pub struct ChatService {
    pool: DbPool,
    router: Arc<dyn Router>,
    outboxes: Arc<Outboxes>,
    contact_repo: ContactRepository,
    message_repo: MessageRepository,
}

impl ChatService {
    #[must_use]
    pub fn new(pool: DbPool, router: Arc<dyn Router>, outboxes: Arc<Outboxes>) -> Self {
        Self {
            pool,
            router,
            outboxes,
            contact_repo: ContactRepository::new(),
            message_repo: MessageRepository::new(),
        }
    }

    /// Starts or resumes a conversation. A provided chat id resumes the
    /// matching contact when one exists; otherwise a fresh id is minted and
    /// the router is told to create the conversation before the contact is
    /// loaded back. Returns the contact and whether it is new.
    ///
    /// # Errors
    /// Returns `AppError::Router` if the router cannot be notified, or a
    /// lookup error if the contact cannot be loaded.
    #[tracing::instrument(skip(self, channel), fields(channel = %channel.uuid))]
    pub async fn start_chat(
        &self,
        channel: &Channel,
        requested: Option<ChatId>,
    ) -> Result<(Contact, bool)> {
        if let Some(chat_id) = requested {
            match self.load_contact(channel, &chat_id).await {
                Ok(contact) => return Ok((contact, false)),
                Err(AppError::NotFound) => {
                    tracing::debug!(chat_id = %chat_id, "Unknown chat id, starting fresh");
                }
                Err(e) => return Err(e),
            }
        }

        let chat_id = ChatId::new_random();
        self.router.start_chat(channel, &chat_id).await.map_err(AppError::Router)?;

        // the router creates the contact as a side effect of the
        // notification, so it should load now
        let contact = self.load_contact(channel, &chat_id).await?;

        tracing::info!(chat_id = %chat_id, "Chat started");
        Ok((contact, true))
    }

    /// Looks up the contact behind a chat id on this channel's org.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown chat ids.
    pub async fn load_contact(&self, channel: &Channel, chat_id: &ChatId) -> Result<Contact> {
        let mut conn = self.pool.acquire().await?;
        self.contact_repo.fetch(&mut conn, channel.org_id, chat_id).await
    }

    /// Forwards a client-authored message to the router. At-most-once: a
    /// failed notification is not retried here.
    ///
    /// # Errors
    /// Returns `AppError::Router` on notification failure.
    pub async fn create_msg(
        &self,
        channel: &Channel,
        contact: &Contact,
        text: &str,
        attachments: &[String],
    ) -> Result<()> {
        self.router.create_msg(channel, contact, text, attachments).await.map_err(AppError::Router)
    }

    /// Loads one page of prior messages in both directions, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    pub async fn history(&self, contact: &Contact, before: OffsetDateTime) -> Result<Vec<StoredMsg>> {
        let mut conn = self.pool.acquire().await?;
        self.message_repo.fetch_history(&mut conn, contact.id, before, HISTORY_PAGE_SIZE).await
    }

    /// Stores the email a visitor supplied for the contact.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the contact row is gone.
    pub async fn set_email(&self, contact: &Contact, email: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.contact_repo.update_email(&mut conn, contact.id, email).await
    }

    /// Handles a client's delivery confirmation: reports it to the router,
    /// then pops the confirmed item and restores readiness for the next one.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when the confirmation does not match
    /// the queue head (duplicate ack or stale client retry).
    #[tracing::instrument(skip(self, channel, contact), fields(chat_id = %contact.chat_id, msg_id = %msg_id))]
    pub async fn confirm_delivery(
        &self,
        channel: &Channel,
        contact: &Contact,
        msg_id: MsgId,
    ) -> Result<()> {
        if let Err(e) = self
            .router
            .report_status(channel.uuid, &contact.chat_id, msg_id, MsgStatus::Delivered)
            .await
        {
            tracing::error!(error = %e, "Failed to report delivery to router");
        }

        let conversation = Conversation::new(channel.uuid, contact.chat_id.clone());
        match self.outboxes.record_sent(&conversation, &ItemId::for_msg(msg_id)).await {
            Ok(_) => Ok(()),
            Err(OutboxError::Redis(e)) => {
                tracing::warn!(error = %e, "Coordination store unavailable, delivery not recorded");
                Ok(())
            }
            Err(e) => Err(AppError::BadRequest(e.to_string())),
        }
    }

    /// Marks the conversation ready to receive its next queued message.
    pub async fn chat_opened(&self, channel: &Channel, chat_id: &ChatId) {
        let conversation = Conversation::new(channel.uuid, chat_id.clone());
        if let Err(e) = self.outboxes.set_ready(&conversation, true).await {
            tracing::warn!(error = %e, chat_id = %chat_id, "Coordination store unavailable, chat not marked ready");
        }
    }

    /// Marks the conversation no longer ready; its queue, if any, survives
    /// for the next session.
    pub async fn chat_closed(&self, channel: &Channel, chat_id: &ChatId) {
        let conversation = Conversation::new(channel.uuid, chat_id.clone());
        if let Err(e) = self.outboxes.set_ready(&conversation, false).await {
            tracing::warn!(error = %e, chat_id = %chat_id, "Coordination store unavailable, chat not marked unready");
        }
    }

    /// Queues a router-authored message for delivery.
    pub async fn queue_msg(&self, channel: &Channel, chat_id: &ChatId, msg: MsgOut) {
        let conversation = Conversation::new(channel.uuid, chat_id.clone());
        if let Err(e) = self.outboxes.add_message(&conversation, msg).await {
            tracing::warn!(error = %e, chat_id = %chat_id, "Coordination store unavailable, message not queued");
        }
    }
}
