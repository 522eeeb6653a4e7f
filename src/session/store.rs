//! Session store
//!
//! Process-wide map from session id to session. Each session sits behind its
//! own async mutex so turns on one session are serialized while different
//! sessions proceed independently. The map itself is sharded to keep lookups
//! for unrelated sessions off a single lock.

use super::Session;
use chrono::Utc;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Shared, lockable session. Hold the guard for the whole turn.
pub type SessionHandle = Arc<Mutex<Session>>;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<SessionHandle>;

    /// Insert or replace a session, returning its handle.
    async fn put(&self, session: Session) -> SessionHandle;

    /// Insert `session` unless its id is already present; either way return
    /// the handle now stored under that id.
    async fn insert_if_absent(&self, session: Session) -> SessionHandle;

    async fn delete(&self, session_id: &str) -> bool;

    /// Drop sessions idle for at least `ttl`. Sessions with a turn in flight
    /// are skipped. Returns the number removed.
    async fn evict_idle(&self, ttl: Duration) -> usize;

    async fn len(&self) -> usize;
}

const DEFAULT_SHARDS: usize = 16;

pub struct InMemorySessionStore {
    shards: Vec<RwLock<HashMap<String, SessionHandle>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(count: usize) -> Self {
        let count = count.max(1);
        Self {
            shards: (0..count).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, session_id: &str) -> &RwLock<HashMap<String, SessionHandle>> {
        let mut hasher = DefaultHasher::new();
        session_id.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let shard = self.shard(session_id).read().await;
        shard.get(session_id).cloned()
    }

    async fn put(&self, session: Session) -> SessionHandle {
        let id = session.session_id.clone();
        let handle = Arc::new(Mutex::new(session));
        let mut shard = self.shard(&id).write().await;
        shard.insert(id, handle.clone());
        handle
    }

    async fn insert_if_absent(&self, session: Session) -> SessionHandle {
        let mut shard = self.shard(&session.session_id).write().await;
        shard
            .entry(session.session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone()
    }

    async fn delete(&self, session_id: &str) -> bool {
        let mut shard = self.shard(session_id).write().await;
        shard.remove(session_id).is_some()
    }

    async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut removed = 0;

        for shard in &self.shards {
            let mut shard = shard.write().await;
            shard.retain(|id, handle| {
                let Ok(session) = handle.try_lock() else {
                    return true;
                };
                let expired = (now - session.last_active)
                    .to_std()
                    .map(|idle| idle >= ttl)
                    .unwrap_or(false);
                if expired {
                    debug!(session_id = %id, "Evicting idle session");
                    removed += 1;
                }
                !expired
            });
        }

        removed
    }

    async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowState;
    use crate::session::ConversationHistory;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemorySessionStore::new();
        store
            .put(Session::new("sess_a", ConversationHistory::new()))
            .await;

        let handle = store.get("sess_a").await.expect("session stored");
        handle.lock().await.advance_to(WorkflowState::AwaitingAmount);

        let again = store.get("sess_a").await.unwrap();
        assert_eq!(again.lock().await.state(), WorkflowState::AwaitingAmount);

        assert!(store.delete("sess_a").await);
        assert!(store.get("sess_a").await.is_none());
        assert!(!store.delete("sess_a").await);
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing() {
        let store = InMemorySessionStore::new();
        let first = store
            .insert_if_absent(Session::new("sess_b", ConversationHistory::new()))
            .await;
        first.lock().await.advance_to(WorkflowState::Decided);

        let second = store
            .insert_if_absent(Session::new("sess_b", ConversationHistory::new()))
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.state(), WorkflowState::Decided);
    }

    #[tokio::test]
    async fn test_evict_idle_skips_active_and_fresh_sessions() {
        let store = InMemorySessionStore::with_shards(2);

        let mut stale = Session::new("sess_stale", ConversationHistory::new());
        stale.last_active = Utc::now() - chrono::Duration::seconds(600);
        store.put(stale).await;

        let mut busy = Session::new("sess_busy", ConversationHistory::new());
        busy.last_active = Utc::now() - chrono::Duration::seconds(600);
        let busy = store.put(busy).await;

        store
            .put(Session::new("sess_fresh", ConversationHistory::new()))
            .await;

        let _guard = busy.lock().await;
        let removed = store.evict_idle(Duration::from_secs(300)).await;

        assert_eq!(removed, 1);
        assert!(store.get("sess_stale").await.is_none());
        assert!(store.get("sess_busy").await.is_some());
        assert!(store.get("sess_fresh").await.is_some());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_turns_on_one_session_are_serialized() {
        let store = Arc::new(InMemorySessionStore::new());
        store
            .put(Session::new("sess_c", ConversationHistory::new()))
            .await;

        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let handle = store.get("sess_c").await.unwrap();
                let mut session = handle.lock().await;
                let before = session.history.message_count();
                tokio::task::yield_now().await;
                session
                    .history
                    .push(crate::session::MessageRole::User, format!("turn {}", i));
                assert_eq!(session.history.message_count(), before + 1);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let handle = store.get("sess_c").await.unwrap();
        assert_eq!(handle.lock().await.history.message_count(), 20);
    }
}
