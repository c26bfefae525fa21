use crate::adapters::redis::RedisClient;
use crate::domain::{ChatId, Conversation, ItemId, MsgOut};
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use time::OffsetDateTime;

/// Peeks the head item of every queue in this instance's ready set and
/// removes those conversations from the set, all in one atomic step so a
/// concurrent ack or readiness change on another instance can't interleave.
/// Conversations with empty queues stay in the set. Returns a flat list of
/// alternating member / item pairs.
static READ_READY: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local ready = redis.call('SMEMBERS', KEYS[2])
        local result = {}
        for _, member in ipairs(ready) do
            local head = redis.call('LINDEX', ARGV[1] .. ':queue:' .. member, 0)
            if head then
                redis.call('SREM', KEYS[2], member)
                result[#result + 1] = member
                result[#result + 1] = head
            end
        end
        return result
        ",
    )
});

/// Confirms delivery of the head item. Guards against acking the wrong
/// item: an empty queue or a head id mismatch leaves everything untouched.
/// On success the head is popped, the index score follows the new head (or
/// the conversation leaves the index), and the conversation re-enters the
/// ready set when items remain so the next pop needs no new ready call.
static RECORD_SENT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local head = redis.call('LINDEX', KEYS[2], 0)
        if not head then
            return {'empty', ''}
        end
        local decoded = cjson.decode(head)
        if decoded['_id'] ~= ARGV[2] then
            return {'wrong-id', decoded['_id']}
        end
        redis.call('LPOP', KEYS[2])
        local next_head = redis.call('LINDEX', KEYS[2], 0)
        if next_head then
            local next_decoded = cjson.decode(next_head)
            redis.call('ZADD', KEYS[1], next_decoded['_ts'], ARGV[1])
            redis.call('SADD', KEYS[3], ARGV[1])
            return {'ok', 'true'}
        end
        redis.call('ZREM', KEYS[1], ARGV[1])
        return {'ok', 'false'}
        ",
    )
});

/// Drains a queue completely and removes the conversation from the index
/// and this instance's ready set.
static POP_ALL: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local items = redis.call('LRANGE', KEYS[1], 0, -1)
        redis.call('DEL', KEYS[1])
        redis.call('ZREM', KEYS[2], ARGV[1])
        redis.call('SREM', KEYS[3], ARGV[1])
        return items
        ",
    )
});

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("no messages in queue for chat {0}")]
    EmptyQueue(ChatId),
    #[error("expected item {expected} in queue, found {found}")]
    ItemMismatch { expected: ItemId, found: ItemId },
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error("error decoding queued item: {0}")]
    Decode(#[from] serde_json::Error),
}

/// An item as stored in a queue: the message plus the stable item id and
/// enqueue time the scripts key on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxItem {
    #[serde(rename = "_id")]
    pub item_id: ItemId,
    #[serde(rename = "_ts")]
    pub enqueued_at: i64,
    #[serde(flatten)]
    pub msg: MsgOut,
}

impl OutboxItem {
    #[must_use]
    pub fn new(msg: MsgOut) -> Self {
        Self { item_id: msg.item_id(), enqueued_at: msg.enqueue_millis(), msg }
    }
}

/// One entry of the global queue index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboxSummary {
    pub conversation: Conversation,
    pub oldest: OffsetDateTime,
}

/// Per-conversation delivery queues shared by all gateway instances.
///
/// Queue contents and the global index are shared state; the ready set is
/// per-instance and records which locally-attached sessions can accept
/// their next message right now. A conversation is in the index exactly
/// when its queue is non-empty, scored by the enqueue time of the head.
#[derive(Clone, Debug)]
pub struct Outboxes {
    redis: RedisClient,
    key_base: String,
    instance_id: String,
}

impl Outboxes {
    #[must_use]
    pub const fn new(redis: RedisClient, key_base: String, instance_id: String) -> Self {
        Self { redis, key_base, instance_id }
    }

    /// Appends a message to a conversation's queue, inserting the
    /// conversation into the index if the queue was empty. The push and the
    /// index update are one transaction, so readers never see one without
    /// the other.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable or the item fails to encode.
    pub async fn add_message(&self, conversation: &Conversation, msg: MsgOut) -> Result<(), OutboxError> {
        let item = OutboxItem::new(msg);
        let payload = serde_json::to_string(&item)?;
        let member = conversation.to_string();

        let mut conn = self.redis.connection();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("RPUSH")
            .arg(self.queue_key(&member))
            .arg(payload)
            .ignore()
            // NX keeps the existing score, so the index always reflects the
            // oldest queued item.
            .cmd("ZADD")
            .arg(self.queues_key())
            .arg("NX")
            .arg(item.enqueued_at)
            .arg(&member)
            .ignore();
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    /// Marks a conversation as ready (or not) to receive its next message
    /// on this instance.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    pub async fn set_ready(&self, conversation: &Conversation, ready: bool) -> Result<(), OutboxError> {
        let member = conversation.to_string();
        let mut conn = self.redis.connection();
        if ready {
            let _: i64 = conn.sadd(self.ready_key(), &member).await?;
        } else {
            let _: i64 = conn.srem(self.ready_key(), &member).await?;
        }
        Ok(())
    }

    /// Returns the head item of every ready conversation with a non-empty
    /// queue, atomically consuming their readiness. Items are peeked, not
    /// popped; they leave the queue only via `record_sent`.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable or an item is corrupt.
    pub async fn read_ready(&self) -> Result<Vec<(Conversation, OutboxItem)>, OutboxError> {
        let mut conn = self.redis.connection();
        let pairs: Vec<String> = READ_READY
            .key(self.queues_key())
            .key(self.ready_key())
            .arg(&self.key_base)
            .invoke_async(&mut conn)
            .await?;

        let mut ready = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            let conversation = match pair[0].parse::<Conversation>() {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(member = %pair[0], error = %e, "Skipping unparseable ready member");
                    continue;
                }
            };
            let item: OutboxItem = serde_json::from_str(&pair[1])?;
            ready.push((conversation, item));
        }
        Ok(ready)
    }

    /// Confirms delivery of the item at the head of a conversation's queue
    /// and returns whether more items remain.
    ///
    /// # Errors
    /// Returns `EmptyQueue` if there is nothing to confirm, `ItemMismatch`
    /// (carrying the actual head id) if `item_id` is not the head, and a
    /// store error if the script fails.
    pub async fn record_sent(
        &self,
        conversation: &Conversation,
        item_id: &ItemId,
    ) -> Result<bool, OutboxError> {
        let member = conversation.to_string();
        let mut conn = self.redis.connection();
        let result: Vec<String> = RECORD_SENT
            .key(self.queues_key())
            .key(self.queue_key(&member))
            .key(self.ready_key())
            .arg(&member)
            .arg(item_id.as_str())
            .invoke_async(&mut conn)
            .await?;

        match result[0].as_str() {
            "empty" => Err(OutboxError::EmptyQueue(conversation.chat_id.clone())),
            "wrong-id" => Err(OutboxError::ItemMismatch {
                expected: item_id.clone(),
                found: ItemId::from(result[1].clone()),
            }),
            _ => Ok(result[1] == "true"),
        }
    }

    /// Snapshot of every non-empty queue, ordered oldest-head first.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    pub async fn all(&self) -> Result<Vec<OutboxSummary>, OutboxError> {
        let mut conn = self.redis.connection();
        let entries: Vec<(String, f64)> =
            conn.zrangebyscore_withscores(self.queues_key(), "-inf", "+inf").await?;

        let mut summaries = Vec::with_capacity(entries.len());
        for (member, score) in entries {
            let conversation = match member.parse::<Conversation>() {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(member = %member, error = %e, "Skipping unparseable index member");
                    continue;
                }
            };
            let millis = score as i64;
            let oldest = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
                .unwrap_or(OffsetDateTime::UNIX_EPOCH);
            summaries.push(OutboxSummary { conversation, oldest });
        }
        Ok(summaries)
    }

    /// Drains and returns every item queued for a conversation, removing it
    /// from the index and this instance's ready set. Used to escalate
    /// queues that have gone stale.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable or an item is corrupt.
    pub async fn pop_all(&self, conversation: &Conversation) -> Result<Vec<OutboxItem>, OutboxError> {
        let member = conversation.to_string();
        let mut conn = self.redis.connection();
        let raw: Vec<String> = POP_ALL
            .key(self.queue_key(&member))
            .key(self.queues_key())
            .key(self.ready_key())
            .arg(&member)
            .invoke_async(&mut conn)
            .await?;

        raw.iter().map(|item| Ok(serde_json::from_str(item)?)).collect()
    }

    fn queue_key(&self, member: &str) -> String {
        format!("{}:queue:{member}", self.key_base)
    }

    fn queues_key(&self) -> String {
        format!("{}:queues", self.key_base)
    }

    fn ready_key(&self) -> String {
        format!("{}:ready:{}", self.key_base, self.instance_id)
    }
}
