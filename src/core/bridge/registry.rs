//! Live session bookkeeping keyed by client session id.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::OutboundFrame;
use crate::core::realtime::{RealtimeSession, ScopeToken};

/// Everything held for one registered session.
pub struct SessionEntry {
    id: u64,
    handle: Arc<dyn RealtimeSession>,
    scope: ScopeToken,
    connection: mpsc::Sender<OutboundFrame>,
}

impl SessionEntry {
    /// Registration id, unique for the lifetime of the registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> &Arc<dyn RealtimeSession> {
        &self.handle
    }

    pub fn connection(&self) -> &mpsc::Sender<OutboundFrame> {
        &self.connection
    }

    /// Tear down the session's scope and wait for its tasks.
    pub async fn release(self) {
        debug!(entry_id = self.id, "Releasing session scope");
        self.scope.release().await;
    }

    /// Release the session, then tell its client connection to close.
    ///
    /// Used when another connection takes over the key.
    pub async fn supersede(self) {
        let connection = self.connection.clone();
        let id = self.id;
        self.release().await;
        match connection.try_send(OutboundFrame::Close) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(frame)) => {
                tokio::spawn(async move {
                    let _ = connection.send(frame).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(entry_id = id, "Superseded connection already closed");
            }
        }
    }
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("id", &self.id)
            .field("current_agent", &self.handle.current_agent())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Concurrent map from session key to live session.
///
/// Removal from the map is the single point that decides who tears a session
/// down, so each entry is released exactly once no matter how many callers
/// race on the same key. No map guard is held across an await.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: DashMap<String, SessionEntry>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `key`.
    ///
    /// Returns the new entry id and the displaced entry, if any. The caller
    /// owns the displaced entry and must release it.
    pub fn register(
        &self,
        key: &str,
        handle: Arc<dyn RealtimeSession>,
        scope: ScopeToken,
        connection: mpsc::Sender<OutboundFrame>,
    ) -> (u64, Option<SessionEntry>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = SessionEntry {
            id,
            handle,
            scope,
            connection,
        };
        let displaced = self.entries.insert(key.to_string(), entry);
        (id, displaced)
    }

    /// Session handle for `key`, only while its entry is still `entry_id`.
    pub fn lookup(&self, key: &str, entry_id: u64) -> Option<Arc<dyn RealtimeSession>> {
        self.entries
            .get(key)
            .filter(|entry| entry.id == entry_id)
            .map(|entry| entry.handle.clone())
    }

    /// Current entry id for `key`, if registered.
    pub fn entry_id(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.id)
    }

    /// Remove the entry for `key` whatever its id. The caller owns it and
    /// must release it.
    pub fn take(&self, key: &str) -> Option<SessionEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Release `key` only if its current entry is still `entry_id`.
    pub async fn release_entry(&self, key: &str, entry_id: u64) -> bool {
        let removed = self.entries.remove_if(key, |_, entry| entry.id == entry_id);
        match removed {
            Some((_, entry)) => {
                entry.release().await;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::RealtimeResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;

    struct NullSession;

    #[async_trait]
    impl RealtimeSession for NullSession {
        async fn send_audio(&self, _audio: Bytes) -> RealtimeResult<()> {
            Ok(())
        }

        fn current_agent(&self) -> String {
            "Assistant".to_string()
        }
    }

    fn connection() -> mpsc::Sender<OutboundFrame> {
        mpsc::channel(1).0
    }

    /// Scope whose single task bumps `counter` when cancelled.
    fn counting_scope(counter: Arc<AtomicUsize>) -> ScopeToken {
        let mut scope = ScopeToken::new();
        let token = scope.token();
        scope.attach(tokio::spawn(async move {
            token.cancelled().await;
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        scope
    }

    #[tokio::test]
    async fn test_register_lookup_release() {
        let registry = SessionRegistry::new();
        let handle: Arc<dyn RealtimeSession> = Arc::new(NullSession);

        let (id, displaced) =
            registry.register("s1", handle.clone(), ScopeToken::new(), connection());
        assert!(displaced.is_none());
        assert_eq!(registry.entry_id("s1"), Some(id));

        let found = registry.lookup("s1", id).expect("registered");
        assert!(Arc::ptr_eq(&found, &handle));
        assert!(registry.lookup("s1", id + 1).is_none());

        assert!(registry.release_entry("s1", id).await);
        assert!(registry.lookup("s1", id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_release_absent_is_noop() {
        let registry = SessionRegistry::new();
        assert!(registry.take("missing").is_none());
        assert!(!registry.release_entry("missing", 1).await);
    }

    #[tokio::test]
    async fn test_release_runs_teardown_once() {
        let registry = SessionRegistry::new();
        let teardowns = Arc::new(AtomicUsize::new(0));
        let (id, _) = registry.register(
            "s1",
            Arc::new(NullSession),
            counting_scope(teardowns.clone()),
            connection(),
        );

        let (first, second) = tokio::join!(
            registry.release_entry("s1", id),
            registry.release_entry("s1", id)
        );
        assert!(first ^ second);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_returns_displaced_entry() {
        let registry = SessionRegistry::new();
        let (first_id, _) =
            registry.register("s1", Arc::new(NullSession), ScopeToken::new(), connection());
        let (second_id, displaced) =
            registry.register("s1", Arc::new(NullSession), ScopeToken::new(), connection());

        assert!(second_id > first_id);
        let displaced = displaced.expect("previous entry displaced");
        assert_eq!(displaced.id(), first_id);
        displaced.release().await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_release_entry_ignores_stale_id() {
        let registry = SessionRegistry::new();
        let (old_id, _) =
            registry.register("s1", Arc::new(NullSession), ScopeToken::new(), connection());
        let (new_id, displaced) =
            registry.register("s1", Arc::new(NullSession), ScopeToken::new(), connection());
        if let Some(entry) = displaced {
            entry.release().await;
        }

        assert!(!registry.release_entry("s1", old_id).await);
        assert!(registry.contains("s1"));
        assert!(registry.release_entry("s1", new_id).await);
        assert!(!registry.contains("s1"));
    }

    #[tokio::test]
    async fn test_supersede_releases_then_closes_connection() {
        let registry = SessionRegistry::new();
        let teardowns = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel(4);
        registry.register(
            "s1",
            Arc::new(NullSession),
            counting_scope(teardowns.clone()),
            tx,
        );

        let entry = registry.take("s1").expect("registered");
        assert!(registry.is_empty());
        entry.supersede().await;

        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(rx.recv().await, Some(OutboundFrame::Close));
    }
}
