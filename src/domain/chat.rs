use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque client-held token identifying one browser-side conversation.
/// Stable across reconnects of the same browser tab.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

const CHAT_ID_LEN: usize = 24;

impl ChatId {
    /// Generates a new random URL-safe chat id.
    #[must_use]
    pub fn new_random() -> Self {
        let id: String =
            rand::thread_rng().sample_iter(&Alphanumeric).take(CHAT_ID_LEN).map(char::from).collect();
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A (channel, chat id) pair identifying one ongoing chat thread.
///
/// The coordination store encodes a conversation as `<chat_id>@<channel_uuid>`,
/// which is unambiguous because chat ids are alphanumeric.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Conversation {
    pub channel_uuid: Uuid,
    pub chat_id: ChatId,
}

impl Conversation {
    #[must_use]
    pub const fn new(channel_uuid: Uuid, chat_id: ChatId) -> Self {
        Self { channel_uuid, chat_id }
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.chat_id, self.channel_uuid)
    }
}

impl FromStr for Conversation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chat_id, channel) =
            s.split_once('@').ok_or_else(|| anyhow::anyhow!("invalid conversation encoding: {s}"))?;
        Ok(Self { channel_uuid: Uuid::parse_str(channel)?, chat_id: ChatId::from(chat_id) })
    }
}
