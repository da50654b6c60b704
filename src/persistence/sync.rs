//! Persistence sync
//!
//! Hydrates state from the store at startup and flushes it back on a
//! fixed interval when the dirty tracker says so. Only one flush runs at
//! a time: a periodic flush that finds another in progress is skipped.
//! The dirty flag is cleared only after the store confirms the commit.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::{Store, StoreSnapshot};
use crate::state::BotState;
use crate::types::Result;

/// What a flush attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// Nothing to write
    Clean,
    /// Another flush was already running
    Skipped,
    Flushed { communities: usize, members: usize },
}

pub struct PersistenceSync {
    state: Arc<BotState>,
    store: Arc<dyn Store>,
    interval: Duration,
    flush_lock: Mutex<()>,
    running: Arc<RwLock<bool>>,
    flushes: AtomicU64,
    failures: AtomicU64,
}

impl PersistenceSync {
    pub fn new(state: Arc<BotState>, store: Arc<dyn Store>, interval: Duration) -> Self {
        Self {
            state,
            store,
            interval,
            flush_lock: Mutex::new(()),
            running: Arc::new(RwLock::new(false)),
            flushes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Load every row into state. Any load failure leaves state empty.
    ///
    /// Returns the number of communities loaded.
    pub async fn hydrate(&self) -> usize {
        match self.store.load_all().await {
            Ok(snapshot) => {
                let records = snapshot.into_records();
                let count = records.len();
                self.state.replace_all(records).await;
                info!(communities = count, "State hydrated from store");
                count
            }
            Err(e) => {
                warn!(error = %e, "Hydration failed, starting from empty state");
                self.state.replace_all(Vec::new()).await;
                0
            }
        }
    }

    /// Periodic flush: skip when another flush holds the lock
    pub async fn flush_if_dirty(&self) -> Result<FlushOutcome> {
        let Ok(_guard) = self.flush_lock.try_lock() else {
            debug!("Flush already in progress, skipping");
            return Ok(FlushOutcome::Skipped);
        };
        self.flush_locked().await
    }

    /// Flush, waiting for any in-progress flush to finish first
    pub async fn flush_now(&self) -> Result<FlushOutcome> {
        let _guard = self.flush_lock.lock().await;
        self.flush_locked().await
    }

    async fn flush_locked(&self) -> Result<FlushOutcome> {
        let dirty = self.state.dirty();
        if !dirty.is_dirty() {
            return Ok(FlushOutcome::Clean);
        }

        // Mark first: mutations racing the snapshot stay dirty
        let mark = dirty.begin();
        let records = self.state.snapshot().await;
        let snapshot = StoreSnapshot::from_records(&records);
        let communities = snapshot.communities.len();
        let members = snapshot.members.len();

        if let Err(e) = self.store.upsert_all(&snapshot).await {
            self.failures.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "Flush failed, state stays dirty");
            return Err(e);
        }

        dirty.clear(mark);
        self.flushes.fetch_add(1, Ordering::Relaxed);
        info!(communities, members, "State flushed to store");
        Ok(FlushOutcome::Flushed {
            communities,
            members,
        })
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Start the autosave loop
    pub async fn start(self: Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Autosave already running");
                return;
            }
            *running = true;
        }

        info!(interval = ?self.interval, "Starting autosave");

        let sync = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sync.interval);
            // First tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;

                if !*sync.running.read().await {
                    info!("Autosave stopped");
                    break;
                }

                // Failures are logged in flush; the next tick retries
                let _ = sync.flush_if_dirty().await;
            }
        });
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Stopping autosave");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;
    use crate::types::{ChannelId, CommunityId, MemberId};
    use chrono::DateTime;

    async fn populated_state() -> Arc<BotState> {
        let state = Arc::new(BotState::new());
        state
            .update(&CommunityId::from("g1"), |r| {
                r.broadcast_channel = Some(ChannelId::from("c1"));
                r.reminders = true;
                r.enabled = false;
                r.bumps.total = 7;
                r.bumps.week = 3;
                r.ad_views = 11;
                r.invite_link = "https://invite.test/g1".to_string();
                r.last_broadcast_at = DateTime::from_timestamp_millis(1_700_000_000_000);
                let member = r.member_mut(&MemberId::from("m1"));
                member.bump_count = 7;
                member.xp = 2040;
                member.last_level = 2;
            })
            .await;
        state
    }

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let state = populated_state().await;
        let store = Arc::new(InMemoryStore::new());
        let sync = PersistenceSync::new(Arc::clone(&state), store.clone(), Duration::from_secs(60));

        let outcome = sync.flush_if_dirty().await.unwrap();
        assert_eq!(
            outcome,
            FlushOutcome::Flushed {
                communities: 1,
                members: 1
            }
        );
        assert!(!state.dirty().is_dirty());

        let reloaded = Arc::new(BotState::new());
        let sync2 = PersistenceSync::new(Arc::clone(&reloaded), store, Duration::from_secs(60));
        assert_eq!(sync2.hydrate().await, 1);

        assert_eq!(reloaded.snapshot().await, state.snapshot().await);
        assert!(!reloaded.dirty().is_dirty());
    }

    #[tokio::test]
    async fn test_clean_state_skips_write() {
        let state = Arc::new(BotState::new());
        let store = Arc::new(InMemoryStore::new());
        let sync = PersistenceSync::new(state, store.clone(), Duration::from_secs(60));

        assert_eq!(sync.flush_if_dirty().await.unwrap(), FlushOutcome::Clean);
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_dirty_for_retry() {
        let state = populated_state().await;
        let store = Arc::new(InMemoryStore::new());
        let sync = PersistenceSync::new(Arc::clone(&state), store.clone(), Duration::from_secs(60));

        store.set_fail_writes(true);
        tokio_test::assert_err!(sync.flush_if_dirty().await);
        assert!(state.dirty().is_dirty());
        assert_eq!(sync.failure_count(), 1);

        store.set_fail_writes(false);
        let outcome = tokio_test::assert_ok!(sync.flush_if_dirty().await);
        assert!(matches!(outcome, FlushOutcome::Flushed { .. }));
        assert!(!state.dirty().is_dirty());
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_flush_is_skipped() {
        let state = populated_state().await;
        let store = Arc::new(InMemoryStore::new());
        let sync = PersistenceSync::new(Arc::clone(&state), store.clone(), Duration::from_secs(60));

        let held = sync.flush_lock.lock().await;
        assert_eq!(sync.flush_if_dirty().await.unwrap(), FlushOutcome::Skipped);
        drop(held);

        assert!(state.dirty().is_dirty());
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_hydration_failure_resets_to_empty() {
        let state = populated_state().await;
        let store = Arc::new(InMemoryStore::new());
        store.set_fail_reads(true);
        let sync = PersistenceSync::new(Arc::clone(&state), store, Duration::from_secs(60));

        assert_eq!(sync.hydrate().await, 0);
        assert_eq!(state.community_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let state = Arc::new(BotState::new());
        let store = Arc::new(InMemoryStore::new());
        let sync = Arc::new(PersistenceSync::new(state, store, Duration::from_millis(10)));

        Arc::clone(&sync).start().await;
        assert!(sync.is_running().await);
        sync.stop().await;
        assert!(!sync.is_running().await);
    }
}
