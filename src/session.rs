//! Session storage collaborator.
//!
//! The dispatch core never touches sessions itself. A [`SessionStore`] is
//! attached to a [`Router`](crate::Router) and reached by handlers through
//! [`Context::session`](crate::Context::session) and
//! [`Context::save_session`](crate::Context::save_session).

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::Error;

/// Cookie used to carry the session id when the store does not pick one.
pub const DEFAULT_COOKIE_NAME: &str = "STILESESSID";

/// A session: an opaque id plus string values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    id: String,
    values: HashMap<String, String>,
}

impl Session {
    /// A new, empty session with a random id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: id.into(), values: HashMap::new() }
    }

    pub fn id(&self) -> &str { &self.id }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

/// Loads and persists sessions by id.
pub trait SessionStore: Send + Sync + 'static {
    /// Name of the cookie carrying the session id.
    fn cookie_name(&self) -> &str {
        DEFAULT_COOKIE_NAME
    }

    fn load(&self, id: &str) -> Option<Session>;

    fn save(&self, session: &Session) -> Result<(), Error>;
}

/// Process-local session store. Sessions live until the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        if session.id.is_empty() {
            return Err(Error::Session("session id is empty".to_owned()));
        }
        self.sessions.write().insert(session.id.clone(), session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_get_distinct_ids() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 32);
    }

    #[test]
    fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        let mut session = Session::with_id("abc");
        session.set("user", "alice");
        store.save(&session).unwrap();

        let loaded = store.load("abc").unwrap();
        assert_eq!(loaded.get("user"), Some("alice"));
        assert_eq!(store.len(), 1);
        assert!(store.load("missing").is_none());
    }

    #[test]
    fn memory_store_rejects_empty_id() {
        let store = MemoryStore::new();
        assert!(matches!(store.save(&Session::with_id("")), Err(Error::Session(_))));
        assert!(store.is_empty());
    }
}
