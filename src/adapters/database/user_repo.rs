use crate::adapters::database::records::UserRecord;
use crate::domain::{User, UserId};
use crate::error::{AppError, Result};
use sqlx::PgConnection;

#[derive(Clone, Debug, Default)]
pub struct UserRepository {}

impl UserRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Looks up an active agent user by id.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the user does not exist or is inactive.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch(&self, conn: &mut PgConnection, id: UserId) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, first_name, last_name, avatar
            FROM users
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(id.0)
        .fetch_optional(conn)
        .await?;

        record.map(Into::into).ok_or(AppError::NotFound)
    }
}
