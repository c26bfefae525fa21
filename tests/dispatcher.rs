#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations
)]

mod common;

use common::MockRouter;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;
use wicket_server::adapters::redis::Outboxes;
use wicket_server::api::protocol::Event;
use wicket_server::config::DispatchConfig;
use wicket_server::domain::{ChatId, Conversation, MsgId, MsgOrigin, MsgOut};
use wicket_server::services::gateway::{ClientHandle, ClientRegistry};
use wicket_server::workers::DispatchWorker;

fn config() -> DispatchConfig {
    DispatchConfig { tick_interval_ms: 100, stale_after_secs: 120 }
}

fn msg(id: i64, text: &str, time: OffsetDateTime) -> MsgOut {
    MsgOut {
        id: MsgId(id),
        text: text.to_string(),
        attachments: vec![],
        origin: MsgOrigin::Broadcast,
        user: None,
        time,
    }
}

#[tokio::test]
async fn ready_conversations_hand_off_to_local_sessions() {
    let redis = common::redis_client().await;
    let outboxes = Arc::new(Outboxes::new(redis, common::test_key_base(), "disp1".to_string()));
    let registry = Arc::new(ClientRegistry::new());
    let router = Arc::new(MockRouter::default());
    let worker =
        DispatchWorker::new(Arc::clone(&outboxes), Arc::clone(&registry), router, config());

    let conversation = Conversation::new(common::channel_uuid(), ChatId::from("HandOffToLocalSession000"));
    let (events_tx, mut events_rx) = mpsc::channel(16);
    registry.register(
        conversation.clone(),
        ClientHandle { session_id: Uuid::new_v4(), events: events_tx },
    );

    outboxes.add_message(&conversation, msg(101, "welcome", OffsetDateTime::now_utc())).await.unwrap();
    outboxes.set_ready(&conversation, true).await.unwrap();

    worker.dispatch_once().await;

    let event = events_rx.try_recv().unwrap();
    match event {
        Event::MsgOut { msg_id, text, .. } => {
            assert_eq!(msg_id, MsgId(101));
            assert_eq!(text, "welcome");
        }
        other => panic!("expected msg_out event, got {other:?}"),
    }

    // readiness was consumed by the hand-off: nothing more arrives until
    // the client acks
    worker.dispatch_once().await;
    assert!(events_rx.try_recv().is_err());
}

#[tokio::test]
async fn ready_conversation_without_session_is_left_alone() {
    let redis = common::redis_client().await;
    let outboxes = Arc::new(Outboxes::new(redis, common::test_key_base(), "disp1".to_string()));
    let registry = Arc::new(ClientRegistry::new());
    let router = Arc::new(MockRouter::default());
    let worker =
        DispatchWorker::new(Arc::clone(&outboxes), Arc::clone(&registry), Arc::<MockRouter>::clone(&router), config());

    let conversation = Conversation::new(common::channel_uuid(), ChatId::from("NobodyListeningHere00000"));
    outboxes.add_message(&conversation, msg(102, "hello?", OffsetDateTime::now_utc())).await.unwrap();
    outboxes.set_ready(&conversation, true).await.unwrap();

    worker.dispatch_once().await;

    // the queue survives for the next session; nothing was escalated
    assert_eq!(outboxes.all().await.unwrap().len(), 1);
    assert!(router.calls().is_empty());
}

#[tokio::test]
async fn stale_queues_are_drained_and_reported_failed() {
    let redis = common::redis_client().await;
    let outboxes = Arc::new(Outboxes::new(redis, common::test_key_base(), "disp1".to_string()));
    let registry = Arc::new(ClientRegistry::new());
    let router = Arc::new(MockRouter::default());
    let worker = DispatchWorker::new(Arc::clone(&outboxes), registry, Arc::<MockRouter>::clone(&router), config());

    let conversation = Conversation::new(common::channel_uuid(), ChatId::from("AbandonedConversation000"));
    let stale = OffsetDateTime::now_utc() - time::Duration::minutes(3);
    outboxes.add_message(&conversation, msg(103, "anyone?", stale)).await.unwrap();
    outboxes.add_message(&conversation, msg(104, "hello?", stale + time::Duration::seconds(5))).await.unwrap();

    // a fresh conversation that must survive the sweep
    let fresh = Conversation::new(common::channel_uuid(), ChatId::from("StillFreshConversation00"));
    outboxes.add_message(&fresh, msg(105, "hi", OffsetDateTime::now_utc())).await.unwrap();

    worker.dispatch_once().await;

    let remaining = outboxes.all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].conversation, fresh);

    assert_eq!(
        router.calls(),
        vec![
            format!("ReportStatus({}, AbandonedConversation000, 103, failed)", common::CHANNEL_UUID),
            format!("ReportStatus({}, AbandonedConversation000, 104, failed)", common::CHANNEL_UUID),
        ]
    );
}
