use crate::adapters::redis::Outboxes;
use crate::api::protocol::Event;
use crate::config::DispatchConfig;
use crate::domain::MsgStatus;
use crate::services::gateway::ClientRegistry;
use crate::services::router::Router;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    dispatched_total: Counter<u64>,
    expired_total: Counter<u64>,
    dropped_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("wicket-server");
        Self {
            dispatched_total: meter
                .u64_counter("dispatch_messages_total")
                .with_description("Total queued messages handed to local sessions")
                .build(),
            expired_total: meter
                .u64_counter("dispatch_expired_total")
                .with_description("Total queued messages escalated after going stale")
                .build(),
            dropped_total: meter
                .u64_counter("dispatch_dropped_total")
                .with_description("Total hand-offs dropped because the session buffer was full")
                .build(),
        }
    }
}

/// The delivery loop: matches ready conversations to locally-attached
/// sessions and escalates queues nobody is draining. Ticks are strictly
/// sequential; a slow tick delays the next one rather than overlapping it.
#[derive(Debug)]
pub struct DispatchWorker {
    outboxes: Arc<Outboxes>,
    registry: Arc<ClientRegistry>,
    router: Arc<dyn Router>,
    config: DispatchConfig,
    metrics: Metrics,
}

impl DispatchWorker {
    #[must_use]
    pub fn new(
        outboxes: Arc<Outboxes>,
        registry: Arc<ClientRegistry>,
        router: Arc<dyn Router>,
        config: DispatchConfig,
    ) -> Self {
        Self { outboxes, registry, router, config, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    self.dispatch_once()
                        .instrument(tracing::debug_span!("dispatch_tick"))
                        .await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Dispatch loop shutting down...");
    }

    /// One dispatch tick: escalate stale queues, then hand the head item of
    /// every ready conversation to its local session. Store errors end the
    /// tick early; per-conversation errors are logged and skipped.
    pub async fn dispatch_once(&self) {
        self.expire_stale().await;

        let ready = match self.outboxes.read_ready().await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::error!(error = %e, "Error reading ready outboxes");
                return;
            }
        };

        for (conversation, item) in ready {
            match self.registry.sender_for(&conversation) {
                Some(events) => {
                    // try_send so one slow client can't stall the tick; a
                    // dropped hand-off resolves itself when the client acks
                    // or reconnects
                    if events.try_send(Event::msg_out(item.msg)).is_err() {
                        tracing::warn!(conversation = %conversation, "Session buffer full, hand-off dropped");
                        self.metrics.dropped_total.add(1, &[]);
                    } else {
                        self.metrics.dispatched_total.add(1, &[]);
                    }
                }
                None => {
                    // readiness raced a disconnect; the queue survives for
                    // the next session
                    tracing::debug!(conversation = %conversation, "No local session for ready conversation");
                }
            }
        }
    }

    /// Drains queues whose oldest item has aged past the staleness
    /// threshold and reports each drained message to the router as failed,
    /// bounding how long a disconnected client can leave messages queued.
    async fn expire_stale(&self) {
        let outboxes = match self.outboxes.all().await {
            Ok(all) => all,
            Err(e) => {
                tracing::error!(error = %e, "Error reading outbox index");
                return;
            }
        };

        let cutoff = OffsetDateTime::now_utc() - Duration::from_secs(self.config.stale_after_secs);

        for summary in outboxes {
            if summary.oldest > cutoff {
                break; // index is ordered oldest first
            }

            let items = match self.outboxes.pop_all(&summary.conversation).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!(error = %e, conversation = %summary.conversation, "Error draining stale outbox");
                    continue;
                }
            };

            tracing::info!(
                conversation = %summary.conversation,
                count = items.len(),
                "Drained stale outbox"
            );
            self.metrics.expired_total.add(items.len() as u64, &[KeyValue::new("reason", "stale")]);

            for item in items {
                let Some(msg_id) = item.item_id.as_msg() else { continue };
                if let Err(e) = self
                    .router
                    .report_status(
                        summary.conversation.channel_uuid,
                        &summary.conversation.chat_id,
                        msg_id,
                        MsgStatus::Failed,
                    )
                    .await
                {
                    tracing::error!(error = %e, msg_id = %msg_id, "Failed to report expired message");
                }
            }
        }
    }
}
