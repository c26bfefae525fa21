pub mod channel_repo;
pub mod contact_repo;
pub mod message_repo;
pub mod records;
pub mod user_repo;

pub use channel_repo::ChannelRepository;
pub use contact_repo::ContactRepository;
pub use message_repo::MessageRepository;
pub use user_repo::UserRepository;

pub type DbPool = sqlx::PgPool;

/// Creates the shared connection pool.
///
/// # Errors
/// Returns an error if the database is unreachable.
pub async fn init_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(16).connect(database_url).await?;
    Ok(pool)
}
