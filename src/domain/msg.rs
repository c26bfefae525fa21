use crate::domain::user::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Router-assigned message identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(pub i64);

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an item in a delivery queue. Message items are tagged
/// `m<msg_id>` so the id stays stable even if the JSON payload changes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    #[must_use]
    pub fn for_msg(id: MsgId) -> Self {
        Self(format!("m{id}"))
    }

    /// The message id if this item identifies a message.
    #[must_use]
    pub fn as_msg(&self) -> Option<MsgId> {
        self.0.strip_prefix('m').and_then(|rest| rest.parse().ok()).map(MsgId)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Where an outbound message originated on the router side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgOrigin {
    Flow,
    Broadcast,
    Ticket,
    Chat,
}

impl std::str::FromStr for MsgOrigin {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flow" => Ok(Self::Flow),
            "broadcast" => Ok(Self::Broadcast),
            "ticket" => Ok(Self::Ticket),
            "chat" => Ok(Self::Chat),
            _ => Err(()),
        }
    }
}

/// Delivery status reported back to the router for an outbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgStatus {
    Delivered,
    Failed,
}

/// Snapshot of the authoring user embedded in an outbound message at
/// enqueue time, so delivery needs no further lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUser {
    pub id: UserId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// An outbound message as carried through the delivery queue and rendered
/// to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsgOut {
    pub id: MsgId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    pub origin: MsgOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<MsgUser>,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

impl MsgOut {
    #[must_use]
    pub fn item_id(&self) -> ItemId {
        ItemId::for_msg(self.id)
    }

    #[must_use]
    pub const fn enqueue_millis(&self) -> i64 {
        (self.time.unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Direction of a stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// A message row loaded from the datastore for history pages.
#[derive(Clone, Debug)]
pub struct StoredMsg {
    pub id: MsgId,
    pub text: String,
    pub attachments: Vec<String>,
    pub direction: Direction,
    pub origin: MsgOrigin,
    pub created_by_id: Option<UserId>,
    pub created_on: OffsetDateTime,
}
