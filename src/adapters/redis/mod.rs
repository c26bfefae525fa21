pub mod outbox;

pub use outbox::{Outboxes, OutboxError, OutboxItem, OutboxSummary};

use redis::aio::ConnectionManager;

/// Shared handle to the coordination store. The connection manager
/// reconnects on its own, so callers treat failures as transient.
#[derive(Clone, Debug)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    /// Connects to the coordination store.
    ///
    /// # Errors
    /// Returns an error if the initial connection fails.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    /// Returns a connection handle for issuing commands.
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}
