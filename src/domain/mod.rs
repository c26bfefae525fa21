pub mod channel;
pub mod chat;
pub mod contact;
pub mod msg;
pub mod user;

pub use channel::Channel;
pub use chat::{ChatId, Conversation};
pub use contact::Contact;
pub use msg::{Direction, ItemId, MsgId, MsgOrigin, MsgOut, MsgStatus, MsgUser, StoredMsg};
pub use user::{User, UserId};
