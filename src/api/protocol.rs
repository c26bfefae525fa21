use crate::domain::{ChatId, MsgId, MsgOrigin, MsgOut, MsgUser};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A command sent by a browser client over the socket. Unknown `type` tags
/// and missing required fields fail decoding; the session drops such
/// frames without closing the connection.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    StartChat {
        #[serde(default)]
        chat_id: Option<ChatId>,
    },
    SendMsg {
        text: String,
        #[serde(default)]
        attachments: Vec<String>,
    },
    GetHistory {
        #[serde(with = "time::serde::rfc3339")]
        before: OffsetDateTime,
    },
    SetEmail {
        email: String,
    },
    AckChat {
        msg_id: MsgId,
    },
}

impl Command {
    /// The wire tag, for logging.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::StartChat { .. } => "start_chat",
            Self::SendMsg { .. } => "send_msg",
            Self::GetHistory { .. } => "get_history",
            Self::SetEmail { .. } => "set_email",
            Self::AckChat { .. } => "ack_chat",
        }
    }
}

/// An event sent to a browser client. History entries reuse the message
/// variants, so a history frame is a list of tagged events.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ChatStarted {
        #[serde(with = "time::serde::rfc3339")]
        time: OffsetDateTime,
        chat_id: ChatId,
    },
    ChatResumed {
        #[serde(with = "time::serde::rfc3339")]
        time: OffsetDateTime,
        chat_id: ChatId,
        email: String,
    },
    MsgOut {
        #[serde(with = "time::serde::rfc3339")]
        time: OffsetDateTime,
        msg_id: MsgId,
        text: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<String>,
        origin: MsgOrigin,
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<MsgUser>,
    },
    MsgIn {
        #[serde(with = "time::serde::rfc3339")]
        time: OffsetDateTime,
        msg_id: MsgId,
        text: String,
    },
    History {
        #[serde(with = "time::serde::rfc3339")]
        time: OffsetDateTime,
        history: Vec<Event>,
    },
}

impl Event {
    #[must_use]
    pub fn chat_started(chat_id: ChatId) -> Self {
        Self::ChatStarted { time: OffsetDateTime::now_utc(), chat_id }
    }

    #[must_use]
    pub fn chat_resumed(chat_id: ChatId, email: String) -> Self {
        Self::ChatResumed { time: OffsetDateTime::now_utc(), chat_id, email }
    }

    /// Renders an outbound message, stamped with the message's own time.
    #[must_use]
    pub fn msg_out(msg: MsgOut) -> Self {
        Self::MsgOut {
            time: msg.time,
            msg_id: msg.id,
            text: msg.text,
            attachments: msg.attachments,
            origin: msg.origin,
            user: msg.user,
        }
    }

    #[must_use]
    pub fn msg_in(msg_id: MsgId, text: String, time: OffsetDateTime) -> Self {
        Self::MsgIn { time, msg_id, text }
    }

    #[must_use]
    pub fn history(history: Vec<Event>) -> Self {
        Self::History { time: OffsetDateTime::now_utc(), history }
    }
}
