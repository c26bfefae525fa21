use crate::adapters::database::records::ChannelRecord;
use crate::domain::Channel;
use crate::error::{AppError, Result};
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct ChannelRepository {}

impl ChannelRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Looks up an active webchat channel by its UUID.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no active channel matches.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch(&self, conn: &mut PgConnection, uuid: Uuid) -> Result<Channel> {
        let record = sqlx::query_as::<_, ChannelRecord>(
            r#"
            SELECT id, uuid, org_id, config->>'secret' AS secret
            FROM channels
            WHERE uuid = $1 AND channel_type = 'CHP' AND is_active
            "#,
        )
        .bind(uuid)
        .fetch_optional(conn)
        .await?;

        record.map(Into::into).ok_or(AppError::NotFound)
    }
}
