//! Session state and durable storage.
//!
//! Every active story is a [`Session`] keyed by sender (or channel, in
//! collaborative mode). The [`SessionStore`] holds them behind a mutex
//! and batches writes to a JSON file so a chatty channel doesn't grind
//! the flash storage: saves are skipped while the map is clean or the
//! minimum save interval hasn't elapsed, except when a caller forces a
//! flush at a durability point (story end, quit, shutdown).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Number of recent story beats kept per session for prompt context.
pub const HISTORY_WINDOW: usize = 6;

/// Whether a session's story is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Finished,
}

/// One player's (or one channel's) story state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub status: SessionStatus,

    /// Canonical theme the story runs under.
    pub theme: String,

    /// Current node id when the story is graph-driven.
    pub node: String,

    /// Recent story beats, oldest first, capped at [`HISTORY_WINDOW`].
    pub history: Vec<String>,

    /// Unix seconds of the last command that touched this session.
    pub last_active: u64,
}

impl Session {
    /// Fresh session at the start of a story.
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Active,
            theme: theme.into(),
            node: crate::story::ENTRY_NODE.to_string(),
            history: Vec::new(),
            last_active: now_secs(),
        }
    }

    /// Append a story beat, dropping the oldest past the window.
    pub fn push_history(&mut self, beat: impl Into<String>) {
        self.history.push(beat.into());
        if self.history.len() > HISTORY_WINDOW {
            let excess = self.history.len() - HISTORY_WINDOW;
            self.history.drain(..excess);
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Current wall-clock time as unix seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

struct Inner {
    sessions: HashMap<String, Session>,
    /// Bumped on every mutation.
    generation: u64,
    /// Generation last written to disk.
    saved_generation: u64,
    last_saved: Option<Instant>,
}

impl Inner {
    fn dirty(&self) -> bool {
        self.generation != self.saved_generation
    }
}

/// Thread-safe session map with batched JSON persistence.
pub struct SessionStore {
    inner: Mutex<Inner>,
    path: PathBuf,
    min_save_interval: Duration,
}

impl SessionStore {
    /// Create an empty store backed by `path`.
    pub fn new(path: impl Into<PathBuf>, min_save_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                generation: 0,
                saved_generation: 0,
                last_saved: None,
            }),
            path: path.into(),
            min_save_interval,
        }
    }

    /// Load sessions from the backing file.
    ///
    /// A missing or unreadable file yields an empty store; restoring
    /// nothing is always preferable to refusing to start.
    pub async fn load(&self) {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read session file");
                return;
            }
        };
        let sessions: HashMap<String, Session> = match serde_json::from_str(&data) {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session file corrupt, starting empty");
                return;
            }
        };
        let mut inner = self.lock();
        let count = sessions.len();
        inner.sessions = sessions;
        inner.saved_generation = inner.generation;
        tracing::info!(count, path = %self.path.display(), "restored sessions");
    }

    /// Snapshot of one session, if present.
    pub fn get(&self, key: &str) -> Option<Session> {
        self.lock().sessions.get(key).cloned()
    }

    /// Mutate (creating if absent) the session under `key`.
    ///
    /// Stamps `last_active` and marks the store dirty.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut Session),
    {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(crate::story::DEFAULT_THEME));
        f(session);
        session.last_active = now_secs();
        inner.generation += 1;
    }

    /// Remove one session and flush immediately. Idempotent.
    pub async fn clear(&self, key: &str) {
        {
            let mut inner = self.lock();
            if inner.sessions.remove(key).is_none() {
                return;
            }
            inner.generation += 1;
        }
        self.persist(true).await;
    }

    /// Remove every session and flush immediately.
    pub async fn clear_all(&self) {
        {
            let mut inner = self.lock();
            if inner.sessions.is_empty() {
                return;
            }
            inner.sessions.clear();
            inner.generation += 1;
        }
        self.persist(true).await;
    }

    /// Drop sessions idle strictly longer than `ttl` as of `now`;
    /// a session exactly at the ttl is kept. Returns the number
    /// removed. Does not flush; expiry is routine housekeeping and
    /// the next batched save will pick it up.
    pub fn expire(&self, now: u64, ttl: Duration) -> usize {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        let ttl = ttl.as_secs();
        inner
            .sessions
            .retain(|_, s| now.saturating_sub(s.last_active) <= ttl);
        let removed = before - inner.sessions.len();
        if removed > 0 {
            inner.generation += 1;
            tracing::debug!(removed, "expired idle sessions");
        }
        removed
    }

    /// Write the session map to disk if it is dirty.
    ///
    /// Unforced saves are additionally skipped while the minimum save
    /// interval hasn't elapsed; `force` bypasses that for durability
    /// points. On write failure the store stays dirty so the next save
    /// retries.
    pub async fn persist(&self, force: bool) {
        let (snapshot, generation) = {
            let inner = self.lock();
            if !inner.dirty() {
                return;
            }
            if !force {
                if let Some(last) = inner.last_saved {
                    if last.elapsed() < self.min_save_interval {
                        return;
                    }
                }
            }
            (inner.sessions.clone(), inner.generation)
        };

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize sessions");
                return;
            }
        };

        match tokio::fs::write(&self.path, json).await {
            Ok(()) => {
                let mut inner = self.lock();
                inner.saved_generation = generation.max(inner.saved_generation);
                inner.last_saved = Some(Instant::now());
                tracing::debug!(count = snapshot.len(), "sessions saved");
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to write session file");
            }
        }
    }

    /// Number of sessions whose story is still running.
    pub fn active_count(&self) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.is_active())
            .count()
    }

    /// Most recent `last_active` across all sessions.
    pub fn last_activity(&self) -> Option<u64> {
        self.lock().sessions.values().map(|s| s.last_active).max()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"), Duration::ZERO);
        (dir, store)
    }

    #[test]
    fn test_update_creates_session() {
        let (_dir, store) = temp_store();
        assert!(store.get("alice").is_none());
        store.update("alice", |s| s.theme = "scifi".to_string());
        let session = store.get("alice").unwrap();
        assert_eq!(session.theme, "scifi");
        assert!(session.is_active());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_window() {
        let mut session = Session::new("fantasy");
        for i in 0..10 {
            session.push_history(format!("beat {i}"));
        }
        assert_eq!(session.history.len(), HISTORY_WINDOW);
        assert_eq!(session.history[0], "beat 4");
        assert_eq!(session.history.last().unwrap(), "beat 9");
    }

    #[test]
    fn test_expire_drops_idle_sessions() {
        let (_dir, store) = temp_store();
        store.update("old", |_| {});
        store.update("fresh", |_| {});
        {
            let mut inner = store.lock();
            inner.sessions.get_mut("old").unwrap().last_active = 1_000;
        }
        let now = 1_000 + 7 * 3600;
        let removed = store.expire(now, Duration::from_secs(6 * 3600));
        assert_eq!(removed, 1);
        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn test_expire_keeps_session_exactly_at_ttl() {
        let (_dir, store) = temp_store();
        store.update("edge", |_| {});
        {
            let mut inner = store.lock();
            inner.sessions.get_mut("edge").unwrap().last_active = 1_000;
        }
        let ttl = Duration::from_secs(6 * 3600);
        // Aged exactly ttl: still present. One second past: gone.
        assert_eq!(store.expire(1_000 + ttl.as_secs(), ttl), 0);
        assert!(store.get("edge").is_some());
        assert_eq!(store.expire(1_000 + ttl.as_secs() + 1, ttl), 1);
        assert!(store.get("edge").is_none());
    }

    #[test]
    fn test_active_count_ignores_finished() {
        let (_dir, store) = temp_store();
        store.update("a", |_| {});
        store.update("b", |s| s.status = SessionStatus::Finished);
        assert_eq!(store.len(), 2);
        assert_eq!(store.active_count(), 1);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(&path, Duration::ZERO);
        store.update("alice", |s| {
            s.theme = "horror".to_string();
            s.node = "cellar".to_string();
            s.push_history("the door creaks");
        });
        store.persist(true).await;

        let reloaded = SessionStore::new(&path, Duration::ZERO);
        reloaded.load().await;
        let session = reloaded.get("alice").unwrap();
        assert_eq!(session.theme, "horror");
        assert_eq!(session.node, "cellar");
        assert_eq!(session.history, vec!["the door creaks".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent_and_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(&path, Duration::ZERO);
        store.update("bob", |_| {});
        store.clear("bob").await;
        store.clear("bob").await;
        assert!(store.is_empty());

        let reloaded = SessionStore::new(&path, Duration::ZERO);
        reloaded.load().await;
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_unforced_save_respects_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(&path, Duration::from_secs(3600));
        store.update("a", |_| {});
        store.persist(true).await;

        store.update("b", |_| {});
        store.persist(false).await;

        let on_disk: HashMap<String, Session> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1, "second save should have been batched");

        store.persist(true).await;
        let on_disk: HashMap<String, Session> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[tokio::test]
    async fn test_clean_store_skips_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(&path, Duration::ZERO);
        store.persist(true).await;
        assert!(!path.exists(), "nothing to save, nothing written");
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::new(&path, Duration::ZERO);
        store.load().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let (_dir, store) = temp_store();
        store.load().await;
        assert!(store.is_empty());
    }

    #[test]
    fn test_last_activity() {
        let (_dir, store) = temp_store();
        assert!(store.last_activity().is_none());
        store.update("a", |_| {});
        assert!(store.last_activity().is_some());
    }
}
