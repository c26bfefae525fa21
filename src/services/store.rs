use crate::adapters::database::{ChannelRepository, DbPool, UserRepository};
use crate::domain::{Channel, User, UserId};
use crate::error::Result;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A map whose entries expire a fixed duration after insertion. Entries
/// are immutable snapshots; expiry triggers a fresh fetch, never an
/// in-place update.
pub struct TtlCache<K, V> {
    entries: DashMap<K, (Instant, V)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").field("len", &self.entries.len()).field("ttl", &self.ttl).finish()
    }
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        // the shard guard must be released before removing, so the expiry
        // check and the removal are two steps
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.0.elapsed() < self.ttl {
                    return Some(entry.1.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, (inserted, _)| inserted.elapsed() >= self.ttl);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, (Instant::now(), value));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-through cache over channel and user lookups. Cached configuration
/// is allowed to be stale up to the TTL; that is the accepted tradeoff for
/// skipping a database round-trip per message.
#[derive(Clone, Debug)]
pub struct Store {
    pool: DbPool,
    channel_repo: ChannelRepository,
    user_repo: UserRepository,
    channels: Arc<TtlCache<Uuid, Channel>>,
    users: Arc<TtlCache<UserId, User>>,
}

impl Store {
    #[must_use]
    pub fn new(pool: DbPool, ttl: Duration) -> Self {
        Self {
            pool,
            channel_repo: ChannelRepository::new(),
            user_repo: UserRepository::new(),
            channels: Arc::new(TtlCache::new(ttl)),
            users: Arc::new(TtlCache::new(ttl)),
        }
    }

    /// Fetches a channel, serving from cache when fresh. Concurrent misses
    /// for the same key may fetch twice; that beats locking every hit.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown channels.
    pub async fn channel(&self, uuid: Uuid) -> Result<Channel> {
        if let Some(channel) = self.channels.get(&uuid) {
            return Ok(channel);
        }

        let mut conn = self.pool.acquire().await?;
        let channel = self.channel_repo.fetch(&mut conn, uuid).await?;
        self.channels.insert(uuid, channel.clone());
        Ok(channel)
    }

    /// Fetches a user, serving from cache when fresh.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown or inactive users.
    pub async fn user(&self, id: UserId) -> Result<User> {
        if let Some(user) = self.users.get(&id) {
            return Ok(user);
        }

        let mut conn = self.pool.acquire().await?;
        let user = self.user_repo.fetch(&mut conn, id).await?;
        self.users.insert(id, user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let cache: TtlCache<&str, i64> = TtlCache::new(Duration::from_millis(20));

        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.len(), 1);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_refreshes_expiry() {
        let cache: TtlCache<&str, i64> = TtlCache::new(Duration::from_millis(40));

        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(25));
        cache.insert("a", 2);
        std::thread::sleep(Duration::from_millis(25));

        // the second insert reset the clock
        assert_eq!(cache.get(&"a"), Some(2));
    }
}
