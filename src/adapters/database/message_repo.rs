use crate::adapters::database::records::MessageRecord;
use crate::domain::StoredMsg;
use crate::error::Result;
use sqlx::PgConnection;
use time::OffsetDateTime;

#[derive(Clone, Debug, Default)]
pub struct MessageRepository {}

impl MessageRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Loads a page of visible messages for a contact, newest first, from
    /// before the given timestamp. Ordering ties on `created_on` are broken
    /// by id so pagination is stable.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch_history(
        &self,
        conn: &mut PgConnection,
        contact_id: i64,
        before: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<StoredMsg>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, text, attachments, direction, origin, created_by_id, created_on
            FROM messages
            WHERE contact_id = $1 AND visible AND created_on < $2
            ORDER BY created_on DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(contact_id)
        .bind(before)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
