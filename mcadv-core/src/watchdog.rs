//! Background lifecycle tasks.
//!
//! The watchdog resets every session after a long stretch of total
//! silence and announces the reset on the broadcast channel, so
//! stations that dozed off don't come back to a stale story. A
//! separate ticker drives the store's batched persistence.

use crate::messages;
use crate::store::{now_secs, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Sending half of the unsolicited-broadcast channel.
#[derive(Clone)]
pub struct Broadcaster {
    tx: UnboundedSender<String>,
}

impl Broadcaster {
    /// Queue a broadcast. Dropped silently if the receiver is gone,
    /// which only happens during shutdown.
    pub fn send(&self, message: impl Into<String>) {
        let _ = self.tx.send(message.into());
    }
}

/// Create the broadcast channel: background tasks push messages into
/// the [`Broadcaster`], the transport loop drains the receiver.
pub fn broadcast_channel() -> (Broadcaster, UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Broadcaster { tx }, rx)
}

/// Resets all sessions after prolonged channel-wide inactivity.
pub struct LifecycleWatchdog {
    store: Arc<SessionStore>,
    broadcaster: Broadcaster,
    reset_after: Duration,
    check_interval: Duration,
}

impl LifecycleWatchdog {
    pub fn new(store: Arc<SessionStore>, broadcaster: Broadcaster, reset_after: Duration) -> Self {
        Self {
            store,
            broadcaster,
            reset_after,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Run forever, checking once per interval.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick(now_secs()).await;
        }
    }

    /// One watchdog check. Returns true if a reset fired.
    pub async fn tick(&self, now: u64) -> bool {
        if self.store.active_count() == 0 {
            return false;
        }
        let Some(last) = self.store.last_activity() else {
            return false;
        };
        if now.saturating_sub(last) < self.reset_after.as_secs() {
            return false;
        }

        let count = self.store.len();
        self.store.clear_all().await;
        tracing::info!(count, "reset all sessions after prolonged inactivity");
        self.broadcaster.send(messages::AUTO_RESET);
        true
    }
}

/// Spawn a task that drives batched persistence once per `interval`.
pub fn spawn_persistence_ticker(
    store: Arc<SessionStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            store.persist(false).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionStatus;

    fn temp_store() -> (tempfile::TempDir, Arc<SessionStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(
            dir.path().join("sessions.json"),
            Duration::ZERO,
        ));
        (dir, store)
    }

    #[tokio::test]
    async fn test_no_sessions_no_reset() {
        let (_dir, store) = temp_store();
        let (broadcaster, mut rx) = broadcast_channel();
        let watchdog =
            LifecycleWatchdog::new(store, broadcaster, Duration::from_secs(24 * 3600));
        assert!(!watchdog.tick(1_000_000).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recent_activity_no_reset() {
        let (_dir, store) = temp_store();
        store.update("alice", |_| {});
        let (broadcaster, mut rx) = broadcast_channel();
        let watchdog = LifecycleWatchdog::new(
            store.clone(),
            broadcaster,
            Duration::from_secs(24 * 3600),
        );
        let last = store.last_activity().unwrap();
        assert!(!watchdog.tick(last + 3600).await);
        assert!(rx.try_recv().is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_sessions_reset_and_announced() {
        let (_dir, store) = temp_store();
        store.update("alice", |_| {});
        store.update("bob", |_| {});
        let (broadcaster, mut rx) = broadcast_channel();
        let watchdog = LifecycleWatchdog::new(
            store.clone(),
            broadcaster,
            Duration::from_secs(24 * 3600),
        );
        let last = store.last_activity().unwrap();
        assert!(watchdog.tick(last + 25 * 3600).await);
        assert!(store.is_empty());
        assert_eq!(rx.try_recv().unwrap(), messages::AUTO_RESET);
    }

    #[tokio::test]
    async fn test_finished_only_sessions_do_not_trigger() {
        let (_dir, store) = temp_store();
        store.update("alice", |s| s.status = SessionStatus::Finished);
        let (broadcaster, mut rx) = broadcast_channel();
        let watchdog = LifecycleWatchdog::new(
            store.clone(),
            broadcaster,
            Duration::from_secs(24 * 3600),
        );
        let last = store.last_activity().unwrap();
        assert!(!watchdog.tick(last + 48 * 3600).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcaster_survives_dropped_receiver() {
        let (broadcaster, rx) = broadcast_channel();
        drop(rx);
        broadcaster.send("into the void");
    }
}
