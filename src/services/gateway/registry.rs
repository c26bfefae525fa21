use crate::api::protocol::Event;
use crate::domain::Conversation;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Delivery handle for one live session.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    pub session_id: Uuid,
    pub events: mpsc::Sender<Event>,
}

/// Live sessions by conversation, owned by the server and passed by
/// reference to everything that needs it. Lookups (every dispatch tick)
/// vastly outnumber connect/disconnect writes, hence the reader/writer lock.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<Conversation, ClientHandle>>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a session to a conversation, replacing any previous session
    /// for it (a reconnect supersedes the old socket). Returns the number
    /// of registered sessions.
    pub fn register(&self, conversation: Conversation, handle: ClientHandle) -> usize {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(conversation, handle);
        clients.len()
    }

    /// Unbinds a session. The session id must still match: a session that
    /// lost its conversation to a reconnect must not evict its successor.
    /// Returns the number of sessions left.
    pub fn unregister(&self, conversation: &Conversation, session_id: Uuid) -> usize {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if clients.get(conversation).is_some_and(|h| h.session_id == session_id) {
            clients.remove(conversation);
        }
        clients.len()
    }

    /// The event sender of the session currently bound to a conversation.
    #[must_use]
    pub fn sender_for(&self, conversation: &Conversation) -> Option<mpsc::Sender<Event>> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.get(conversation).map(|h| h.events.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
