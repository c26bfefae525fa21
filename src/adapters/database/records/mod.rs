use crate::domain::{Channel, Contact, Direction, MsgId, MsgOrigin, StoredMsg, User, UserId};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct ChannelRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub org_id: i64,
    pub secret: Option<String>,
}

impl From<ChannelRecord> for Channel {
    fn from(r: ChannelRecord) -> Self {
        Self { id: r.id, uuid: r.uuid, org_id: r.org_id, secret: r.secret }
    }
}

#[derive(Debug, FromRow)]
pub struct ContactRecord {
    pub id: i64,
    pub org_id: i64,
    pub chat_id: String,
    pub email: Option<String>,
}

impl From<ContactRecord> for Contact {
    fn from(r: ContactRecord) -> Self {
        Self {
            id: r.id,
            org_id: r.org_id,
            chat_id: r.chat_id.into(),
            email: r.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct MessageRecord {
    pub id: i64,
    pub text: String,
    pub attachments: Option<Vec<String>>,
    pub direction: String,
    pub origin: String,
    pub created_by_id: Option<i64>,
    pub created_on: OffsetDateTime,
}

impl From<MessageRecord> for StoredMsg {
    fn from(r: MessageRecord) -> Self {
        Self {
            id: MsgId(r.id),
            text: r.text,
            attachments: r.attachments.unwrap_or_default(),
            direction: if r.direction == "I" { Direction::In } else { Direction::Out },
            origin: r.origin.parse().unwrap_or(MsgOrigin::Chat),
            created_by_id: r.created_by_id.map(UserId),
            created_on: r.created_on,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: UserId(r.id),
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            avatar: r.avatar,
        }
    }
}
