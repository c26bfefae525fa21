use crate::adapters::database::records::ContactRecord;
use crate::domain::{ChatId, Contact};
use crate::error::{AppError, Result};
use sqlx::PgConnection;

#[derive(Clone, Debug, Default)]
pub struct ContactRepository {}

impl ContactRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Looks up the contact behind a chat id within an org.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the chat id is unknown.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch(
        &self,
        conn: &mut PgConnection,
        org_id: i64,
        chat_id: &ChatId,
    ) -> Result<Contact> {
        let record = sqlx::query_as::<_, ContactRecord>(
            r#"
            SELECT id, org_id, chat_id, email
            FROM contacts
            WHERE org_id = $1 AND chat_id = $2
            "#,
        )
        .bind(org_id)
        .bind(chat_id.as_str())
        .fetch_optional(conn)
        .await?;

        record.map(Into::into).ok_or(AppError::NotFound)
    }

    /// Updates the email collected for a contact.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the contact row no longer exists.
    #[tracing::instrument(level = "debug", skip(self, conn, email))]
    pub(crate) async fn update_email(
        &self,
        conn: &mut PgConnection,
        contact_id: i64,
        email: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE contacts SET email = $2, modified_on = NOW() WHERE id = $1",
        )
        .bind(contact_id)
        .bind(email)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
