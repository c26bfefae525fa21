#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations
)]

mod common;

use redis::AsyncCommands;
use time::OffsetDateTime;
use time::macros::datetime;
use wicket_server::adapters::redis::{OutboxError, Outboxes};
use wicket_server::domain::{ChatId, Conversation, ItemId, MsgId, MsgOrigin, MsgOut, MsgUser, UserId};

fn conv(chat_id: &str) -> Conversation {
    Conversation::new(common::channel_uuid(), ChatId::from(chat_id))
}

fn msg(id: i64, text: &str, origin: MsgOrigin, time: OffsetDateTime) -> MsgOut {
    MsgOut { id: MsgId(id), text: text.to_string(), attachments: vec![], origin, user: None, time }
}

#[tokio::test]
async fn queueing_and_acking() {
    let redis = common::redis_client().await;
    let key_base = common::test_key_base();
    let outboxes = Outboxes::new(redis.clone(), key_base.clone(), "foo1".to_string());
    let mut conn = redis.connection();

    let bob = MsgUser { id: UserId(3), name: "Bob McFlows".to_string(), avatar: None };

    // queue up some messages for 3 chat ids
    let chat1 = conv("65vbbDAQCdPdEWlEhDGy4utO");
    let chat2 = conv("3xdF7KhyEiabBiCd3Cst3X28");
    let chat3 = conv("itlu4O6ZE4ZZc07Y5rHxcLoQ");

    let mut msg1 = msg(101, "hi", MsgOrigin::Chat, datetime!(2024-01-30 12:55:00 UTC));
    msg1.user = Some(bob.clone());
    outboxes.add_message(&chat1, msg1).await.unwrap();
    let mut msg2 = msg(102, "how can I help", MsgOrigin::Chat, datetime!(2024-01-30 13:01:00 UTC));
    msg2.user = Some(bob.clone());
    outboxes.add_message(&chat1, msg2).await.unwrap();
    outboxes
        .add_message(&chat2, msg(103, "hola", MsgOrigin::Flow, datetime!(2024-01-30 13:32:00 UTC)))
        .await
        .unwrap();
    let mut msg4 = msg(104, "ok", MsgOrigin::Chat, datetime!(2024-01-30 13:05:00 UTC));
    msg4.user = Some(bob);
    outboxes.add_message(&chat1, msg4).await.unwrap();
    outboxes
        .add_message(&chat3, msg(105, "test", MsgOrigin::Flow, datetime!(2024-01-30 13:06:00 UTC)))
        .await
        .unwrap();

    let len: i64 = conn.llen(format!("{key_base}:queue:{chat1}")).await.unwrap();
    assert_eq!(len, 3);
    let len: i64 = conn.llen(format!("{key_base}:queue:{chat2}")).await.unwrap();
    assert_eq!(len, 1);
    let len: i64 = conn.llen(format!("{key_base}:queue:{chat3}")).await.unwrap();
    assert_eq!(len, 1);

    // the index scores each conversation by its oldest queued message
    let all = outboxes.all().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].conversation, chat1);
    assert_eq!(all[0].oldest, datetime!(2024-01-30 12:55:00 UTC));
    assert_eq!(all[1].conversation, chat3);
    assert_eq!(all[1].oldest, datetime!(2024-01-30 13:06:00 UTC));
    assert_eq!(all[2].conversation, chat2);
    assert_eq!(all[2].oldest, datetime!(2024-01-30 13:32:00 UTC));

    // no chats are marked ready, so reading gives us nothing
    let ready = outboxes.read_ready().await.unwrap();
    assert!(ready.is_empty());

    // mark 2 chats as ready
    outboxes.set_ready(&chat1, true).await.unwrap();
    outboxes.set_ready(&chat3, true).await.unwrap();

    let members: Vec<String> = conn.smembers(format!("{key_base}:ready:foo1")).await.unwrap();
    assert_eq!(members.len(), 2);

    // reading now gives us their oldest messages...
    let mut ready = outboxes.read_ready().await.unwrap();
    ready.sort_by_key(|(_, item)| item.msg.id.0);
    assert_eq!(ready.len(), 2);
    assert_eq!(ready[0].0, chat1);
    assert_eq!(ready[0].1.item_id, ItemId::for_msg(MsgId(101)));
    assert_eq!(ready[0].1.msg.text, "hi");
    assert_eq!(ready[1].0, chat3);
    assert_eq!(ready[1].1.item_id, ItemId::for_msg(MsgId(105)));

    // ...and removes them from the instance's ready set
    let members: Vec<String> = conn.smembers(format!("{key_base}:ready:foo1")).await.unwrap();
    assert!(members.is_empty());

    // but nothing is removed from the queues themselves
    let len: i64 = conn.llen(format!("{key_base}:queue:{chat1}")).await.unwrap();
    assert_eq!(len, 3);

    // with readiness consumed, a second read returns nothing until an ack
    let ready = outboxes.read_ready().await.unwrap();
    assert!(ready.is_empty());

    let has_more = outboxes.record_sent(&chat1, &ItemId::for_msg(MsgId(101))).await.unwrap();
    assert!(has_more);

    // msg gone from that queue, other queues unchanged
    let len: i64 = conn.llen(format!("{key_base}:queue:{chat1}")).await.unwrap();
    assert_eq!(len, 2);
    let len: i64 = conn.llen(format!("{key_base}:queue:{chat2}")).await.unwrap();
    assert_eq!(len, 1);

    // index score moved up to the new oldest message
    let all = outboxes.all().await.unwrap();
    assert_eq!(all[0].conversation, chat1);
    assert_eq!(all[0].oldest, datetime!(2024-01-30 13:01:00 UTC));

    // and the chat is back in the ready set without a new set_ready call
    let members: Vec<String> = conn.smembers(format!("{key_base}:ready:foo1")).await.unwrap();
    assert_eq!(members, vec![chat1.to_string()]);

    // recording sent for a chat with an empty queue fails
    let err = outboxes
        .record_sent(&conv("A0UGLTWLLs59CrFzj6VpvMlG"), &ItemId::for_msg(MsgId(101)))
        .await
        .unwrap_err();
    assert!(matches!(err, OutboxError::EmptyQueue(_)));
    assert_eq!(err.to_string(), "no messages in queue for chat A0UGLTWLLs59CrFzj6VpvMlG");

    // recording sent with the wrong item id fails, reporting the actual
    // head, and leaves the queue unmodified
    let err = outboxes.record_sent(&chat1, &ItemId::for_msg(MsgId(999))).await.unwrap_err();
    match &err {
        OutboxError::ItemMismatch { found, .. } => assert_eq!(found.as_str(), "m102"),
        other => panic!("expected ItemMismatch, got {other:?}"),
    }
    assert_eq!(err.to_string(), "expected item m999 in queue, found m102");
    let len: i64 = conn.llen(format!("{key_base}:queue:{chat1}")).await.unwrap();
    assert_eq!(len, 2);
}

#[tokio::test]
async fn delivery_is_fifo_per_conversation() {
    let redis = common::redis_client().await;
    let outboxes = Outboxes::new(redis, common::test_key_base(), "foo1".to_string());
    let chat = conv("FifoFifoFifoFifoFifoFifo");

    for (id, minute) in [(201, 1), (202, 2), (203, 3)] {
        let time = datetime!(2024-01-30 14:00:00 UTC) + time::Duration::minutes(minute);
        outboxes.add_message(&chat, msg(id, "msg", MsgOrigin::Chat, time)).await.unwrap();
    }

    outboxes.set_ready(&chat, true).await.unwrap();

    let mut delivered = Vec::new();
    loop {
        let ready = outboxes.read_ready().await.unwrap();
        let Some((conversation, item)) = ready.into_iter().next() else { break };
        delivered.push(item.msg.id.0);
        outboxes.record_sent(&conversation, &item.item_id).await.unwrap();
    }

    assert_eq!(delivered, vec![201, 202, 203]);

    // fully drained: the conversation left the index and the ready set
    assert!(outboxes.all().await.unwrap().is_empty());
    assert!(outboxes.read_ready().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_queue_keeps_conversation_ready() {
    let redis = common::redis_client().await;
    let key_base = common::test_key_base();
    let outboxes = Outboxes::new(redis.clone(), key_base.clone(), "foo1".to_string());
    let mut conn = redis.connection();
    let chat = conv("NothingQueuedHereAtAll00");

    // a ready conversation with nothing queued stays ready, so a later
    // enqueue is picked up without another set_ready call
    outboxes.set_ready(&chat, true).await.unwrap();
    assert!(outboxes.read_ready().await.unwrap().is_empty());

    let members: Vec<String> = conn.smembers(format!("{key_base}:ready:foo1")).await.unwrap();
    assert_eq!(members, vec![chat.to_string()]);

    outboxes
        .add_message(&chat, msg(301, "late", MsgOrigin::Broadcast, OffsetDateTime::now_utc()))
        .await
        .unwrap();
    let ready = outboxes.read_ready().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].1.item_id, ItemId::for_msg(MsgId(301)));
}

#[tokio::test]
async fn pop_all_drains_queue_and_index() {
    let redis = common::redis_client().await;
    let outboxes = Outboxes::new(redis, common::test_key_base(), "foo1".to_string());
    let chat = conv("DrainMeCompletely0000000");

    outboxes
        .add_message(&chat, msg(401, "one", MsgOrigin::Flow, datetime!(2024-01-30 15:00:00 UTC)))
        .await
        .unwrap();
    outboxes
        .add_message(&chat, msg(402, "two", MsgOrigin::Flow, datetime!(2024-01-30 15:01:00 UTC)))
        .await
        .unwrap();
    outboxes.set_ready(&chat, true).await.unwrap();

    let items = outboxes.pop_all(&chat).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item_id, ItemId::for_msg(MsgId(401)));
    assert_eq!(items[1].item_id, ItemId::for_msg(MsgId(402)));

    assert!(outboxes.all().await.unwrap().is_empty());
    assert!(outboxes.read_ready().await.unwrap().is_empty());
    assert!(outboxes.pop_all(&chat).await.unwrap().is_empty());
}

#[tokio::test]
async fn ready_sets_are_per_instance() {
    let redis = common::redis_client().await;
    let key_base = common::test_key_base();
    let this = Outboxes::new(redis.clone(), key_base.clone(), "ins1".to_string());
    let other = Outboxes::new(redis, key_base, "ins2".to_string());
    let chat = conv("SplitBrainConversation00");

    this.add_message(&chat, msg(501, "hi", MsgOrigin::Chat, OffsetDateTime::now_utc())).await.unwrap();
    this.set_ready(&chat, true).await.unwrap();

    // the other instance has not marked the conversation ready
    assert!(other.read_ready().await.unwrap().is_empty());

    let ready = this.read_ready().await.unwrap();
    assert_eq!(ready.len(), 1);
}
