use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, instrument};

use relay_core::{Turn, UserKey};

use crate::bound::{HistoryBound, Unbounded};

/// Held by the pipeline for the duration of one turn for one user.
pub type TurnGuard = OwnedMutexGuard<()>;

/// In-memory conversation history and model preferences, keyed by user.
///
/// Backed by sharded maps, so operations on different users never wait on
/// each other. An `append` writes both turns while holding the shard lock
/// for that user, so readers never observe half a pair.
///
/// Nothing is persisted; everything is lost when the process exits.
pub struct ContextStore {
    histories: DashMap<UserKey, Vec<Turn>>,
    models: DashMap<UserKey, String>,
    default_model: RwLock<String>,
    turn_locks: DashMap<UserKey, Arc<Mutex<()>>>,
    bound: Box<dyn HistoryBound>,
}

impl ContextStore {
    /// Create a store with unbounded history.
    pub fn new(default_model: impl Into<String>) -> Self {
        Self::with_bound(default_model, Unbounded)
    }

    /// Create a store that trims every history with `bound` after each append.
    pub fn with_bound(default_model: impl Into<String>, bound: impl HistoryBound + 'static) -> Self {
        Self {
            histories: DashMap::new(),
            models: DashMap::new(),
            default_model: RwLock::new(default_model.into()),
            turn_locks: DashMap::new(),
            bound: Box::new(bound),
        }
    }

    /// Record one completed exchange, creating the user's history if needed.
    #[instrument(skip(self, user_text, assistant_text), fields(key = %key))]
    pub fn append(&self, key: &UserKey, user_text: &str, assistant_text: &str) {
        let mut history = self.histories.entry(key.clone()).or_default();
        history.push(Turn::user(user_text));
        history.push(Turn::assistant(assistant_text));
        self.bound.trim(history.value_mut());
        debug!(turns = history.len(), "context updated");
    }

    /// Snapshot of the user's history. Unknown users get an empty history.
    pub fn history(&self, key: &UserKey) -> Vec<Turn> {
        self.histories
            .get(key)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    /// Reset a user's history to empty. The user stays registered.
    #[instrument(skip(self), fields(key = %key))]
    pub fn clear(&self, key: &UserKey) {
        if let Some(mut history) = self.histories.get_mut(key) {
            history.clear();
            debug!("context cleared");
        }
    }

    /// Whether this user has ever had a history recorded.
    pub fn is_known(&self, key: &UserKey) -> bool {
        self.histories.contains_key(key)
    }

    /// Pin a model for one user.
    #[instrument(skip(self), fields(key = %key))]
    pub fn set_model(&self, key: &UserKey, model: &str) {
        self.models.insert(key.clone(), model.to_string());
    }

    /// The user's pinned model, or the process-wide default.
    pub async fn model(&self, key: &UserKey) -> String {
        if let Some(model) = self.models.get(key) {
            return model.value().clone();
        }
        self.default_model().await
    }

    /// Get the current process-wide default model.
    pub async fn default_model(&self) -> String {
        self.default_model.read().await.clone()
    }

    /// Change the process-wide default at runtime. Returns the previous model.
    pub async fn set_default_model(&self, model: String) -> String {
        let mut guard = self.default_model.write().await;
        std::mem::replace(&mut *guard, model)
    }

    /// Serialize turns for one user.
    ///
    /// Hold the returned guard across read-history → complete → append so two
    /// overlapping messages from the same user cannot interleave. Other users
    /// are unaffected.
    pub async fn lock_turn(&self, key: &UserKey) -> TurnGuard {
        let lock = self.turn_locks.entry(key.clone()).or_default().clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_core::Role;

    use super::*;
    use crate::bound::SlidingWindow;

    const DEFAULT: &str = "google/gemini-2.0-flash-lite-preview-02-05:free";

    #[test]
    fn unknown_key_has_empty_history() {
        let store = ContextStore::new(DEFAULT);
        let key = UserKey::from("nobody");
        assert!(store.history(&key).is_empty());
        assert!(!store.is_known(&key));
    }

    #[test]
    fn append_adds_one_alternating_pair() {
        let store = ContextStore::new(DEFAULT);
        let key = UserKey::from("alice");
        store.append(&key, "hi", "hello");
        store.append(&key, "how are you", "fine");

        let history = store.history(&key);
        assert_eq!(history.len(), 4);
        let roles: Vec<Role> = history.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[3].content, "fine");
    }

    #[test]
    fn clear_keeps_key_registered() {
        let store = ContextStore::new(DEFAULT);
        let key = UserKey::from("alice");
        store.append(&key, "hi", "hello");
        store.clear(&key);

        assert!(store.history(&key).is_empty());
        assert!(store.is_known(&key));
    }

    #[test]
    fn histories_are_isolated_per_key() {
        let store = ContextStore::new(DEFAULT);
        store.append(&UserKey::from("alice"), "a", "b");
        assert!(store.history(&UserKey::from("bob")).is_empty());
    }

    #[tokio::test]
    async fn model_falls_back_to_default() {
        let store = ContextStore::new(DEFAULT);
        let key = UserKey::from("alice");
        assert_eq!(store.model(&key).await, DEFAULT);

        store.set_model(&key, "anthropic/claude-3-haiku");
        assert_eq!(store.model(&key).await, "anthropic/claude-3-haiku");
        assert_eq!(store.model(&UserKey::from("bob")).await, DEFAULT);
    }

    #[tokio::test]
    async fn default_model_is_mutable_at_runtime() {
        let store = ContextStore::new(DEFAULT);
        let previous = store.set_default_model("openai/gpt-4o-mini".to_string()).await;
        assert_eq!(previous, DEFAULT);
        assert_eq!(store.model(&UserKey::from("bob")).await, "openai/gpt-4o-mini");
    }

    #[test]
    fn bound_is_applied_after_append() {
        let store = ContextStore::with_bound(DEFAULT, SlidingWindow::new(1));
        let key = UserKey::from("alice");
        store.append(&key, "first", "one");
        store.append(&key, "second", "two");

        let history = store.history(&key);
        assert_eq!(history, vec![Turn::user("second"), Turn::assistant("two")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_never_split_pairs() {
        let store = Arc::new(ContextStore::new(DEFAULT));
        let key = UserKey::from("alice");

        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                store.append(&key, &format!("q{i}"), &format!("a{i}"));
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let history = store.history(&key);
        assert_eq!(history.len(), 64);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }

    #[tokio::test]
    async fn turn_lock_serializes_same_key_only() {
        let store = Arc::new(ContextStore::new(DEFAULT));
        let alice = UserKey::from("alice");

        let guard = store.lock_turn(&alice).await;

        // A different user is not blocked.
        let other = tokio::time::timeout(
            Duration::from_millis(100),
            store.lock_turn(&UserKey::from("bob")),
        )
        .await;
        assert!(other.is_ok());

        // The same user waits until the first guard is released.
        let waiting = {
            let store = Arc::clone(&store);
            let alice = alice.clone();
            tokio::spawn(async move {
                let _g = store.lock_turn(&alice).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("second turn should acquire the lock")
            .unwrap();
    }
}
