//! Session state behind a small trait; the store implementation itself is an
//! external collaborator, the in-memory variant here backs the server and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Session key under which the logged-in consumer's token is kept.
pub const CONSUMER_TOKEN_KEY: &str = "api_consumer_token";

/// Key/value session state scoped by the caller's session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, sid: &str, key: &str) -> Option<String>;
    async fn set(&self, sid: &str, key: &str, value: String);
    async fn has(&self, sid: &str, key: &str) -> bool;
    async fn clear(&self, sid: &str, key: &str);
}

/// Entries are dropped when their last key is cleared; there is no TTL, so
/// abandoned sessions live until their keys are cleared.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, sid: &str, key: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(sid)
            .and_then(|session| session.get(key).cloned())
    }

    async fn set(&self, sid: &str, key: &str, value: String) {
        self.sessions
            .write()
            .await
            .entry(sid.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    async fn has(&self, sid: &str, key: &str) -> bool {
        self.get(sid, key).await.is_some()
    }

    async fn clear(&self, sid: &str, key: &str) {
        let mut sessions = self.sessions.write().await;

        let now_empty = match sessions.get_mut(sid) {
            Some(session) => {
                session.remove(key);
                session.is_empty()
            }
            None => false,
        };

        // Drop the whole entry once its last key is gone, so the map does not
        // accumulate empty sessions.
        if now_empty {
            sessions.remove(sid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_has_clear() {
        let store = MemorySessionStore::new();

        assert!(!store.has("sid", CONSUMER_TOKEN_KEY).await);

        store
            .set("sid", CONSUMER_TOKEN_KEY, "token".to_string())
            .await;
        assert!(store.has("sid", CONSUMER_TOKEN_KEY).await);
        assert_eq!(
            store.get("sid", CONSUMER_TOKEN_KEY).await.as_deref(),
            Some("token")
        );

        store.clear("sid", CONSUMER_TOKEN_KEY).await;
        assert!(!store.has("sid", CONSUMER_TOKEN_KEY).await);
    }

    #[tokio::test]
    async fn clear_evicts_empty_sessions() {
        let store = MemorySessionStore::new();

        store
            .set("sid", CONSUMER_TOKEN_KEY, "token".to_string())
            .await;
        store.set("sid", "theme", "dark".to_string()).await;

        store.clear("sid", CONSUMER_TOKEN_KEY).await;
        assert!(store.sessions.read().await.contains_key("sid"));

        store.clear("sid", "theme").await;
        assert!(!store.sessions.read().await.contains_key("sid"));
    }

    #[tokio::test]
    async fn sessions_are_scoped_by_sid() {
        let store = MemorySessionStore::new();

        store.set("a", CONSUMER_TOKEN_KEY, "one".to_string()).await;

        assert!(store.has("a", CONSUMER_TOKEN_KEY).await);
        assert!(!store.has("b", CONSUMER_TOKEN_KEY).await);
    }
}
