use crate::domain::chat::ChatId;

/// The router-owned contact behind a conversation. The gateway only reads
/// the fields it needs to resume chats and to address router notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub id: i64,
    pub org_id: i64,
    pub chat_id: ChatId,
    pub email: String,
}
