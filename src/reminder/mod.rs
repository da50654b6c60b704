//! Bump reminders
//!
//! After a successful bump in a community with reminders enabled, one
//! delayed notification is scheduled for when the cooldown ends. The job
//! carries only the ids and fire time captured at scheduling. When it
//! fires it does not recheck whether reminders are still enabled or the
//! cooldown still applies; it only resolves the current broadcast channel
//! and checks it can post there.
//!
//! Scheduling a new reminder does not cancel an earlier one.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::platform::{OutboundMessage, Platform};
use crate::state::BotState;
use crate::types::{CommunityId, MemberId};

/// A scheduled reminder, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderJob {
    pub community: CommunityId,
    pub member: MemberId,
    pub fire_at: DateTime<Utc>,
}

pub struct ReminderScheduler {
    state: Arc<BotState>,
    platform: Arc<dyn Platform>,
    jobs: Arc<DashMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
    fired: Arc<AtomicU64>,
}

impl ReminderScheduler {
    pub fn new(state: Arc<BotState>, platform: Arc<dyn Platform>) -> Self {
        Self {
            state,
            platform,
            jobs: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            fired: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule `job`. A fire time in the past fires immediately.
    pub fn schedule(&self, job: ReminderJob) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = (job.fire_at - Utc::now()).to_std().unwrap_or_default();

        debug!(
            community = %job.community,
            member = %job.member,
            fire_at = %job.fire_at,
            "Reminder scheduled"
        );

        let state = Arc::clone(&self.state);
        let platform = Arc::clone(&self.platform);
        let jobs = Arc::clone(&self.jobs);
        let fired = Arc::clone(&self.fired);

        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            deliver(&state, platform.as_ref(), &job).await;
            // The handle must be in the map before it can be removed
            let _ = registered_rx.await;
            jobs.remove(&id);
            fired.fetch_add(1, Ordering::Relaxed);
        });

        self.jobs.insert(id, handle);
        let _ = registered_tx.send(());
    }

    /// Reminders scheduled but not yet fired
    pub fn pending_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Abort every pending reminder (shutdown)
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<u64> = self.jobs.iter().map(|e| *e.key()).collect();
        let mut cancelled = 0;
        for id in ids {
            if let Some((_, handle)) = self.jobs.remove(&id) {
                handle.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(cancelled, "Cancelled pending reminders");
        }
        cancelled
    }
}

async fn deliver(state: &BotState, platform: &dyn Platform, job: &ReminderJob) {
    let Some(channel) = state
        .get(&job.community)
        .await
        .and_then(|record| record.broadcast_channel)
    else {
        debug!(community = %job.community, "Reminder dropped, no broadcast channel");
        return;
    };

    match platform.can_send(&job.community, &channel).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(community = %job.community, channel = %channel, "Reminder dropped, cannot send");
            return;
        }
        Err(e) => {
            warn!(community = %job.community, error = %e, "Reminder capability check failed");
            return;
        }
    }

    let message = OutboundMessage::Reminder {
        member: job.member.clone(),
    };
    if let Err(e) = platform.send(&channel, &message).await {
        warn!(community = %job.community, error = %e, "Reminder delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::InMemoryPlatform;
    use crate::types::ChannelId;
    use std::time::Duration;

    async fn setup() -> (Arc<BotState>, Arc<InMemoryPlatform>, ReminderScheduler) {
        let state = Arc::new(BotState::new());
        state
            .update(&CommunityId::from("g"), |r| {
                r.broadcast_channel = Some(ChannelId::from("c"));
                r.reminders = true;
            })
            .await;
        let platform = Arc::new(InMemoryPlatform::new());
        let scheduler = ReminderScheduler::new(Arc::clone(&state), platform.clone());
        (state, platform, scheduler)
    }

    fn job(delay_ms: i64) -> ReminderJob {
        ReminderJob {
            community: CommunityId::from("g"),
            member: MemberId::from("m"),
            fire_at: Utc::now() + chrono::Duration::milliseconds(delay_ms),
        }
    }

    async fn wait_fired(scheduler: &ReminderScheduler, count: u64) {
        for _ in 0..100 {
            if scheduler.fired_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_reminder_fires_into_current_channel() {
        let (state, platform, scheduler) = setup().await;
        scheduler.schedule(job(20));

        // Channel moved after scheduling: delivery follows the record
        state
            .update(&CommunityId::from("g"), |r| {
                r.broadcast_channel = Some(ChannelId::from("c2"))
            })
            .await;

        wait_fired(&scheduler, 1).await;
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChannelId::from("c2"));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reminder_ignores_disabled_flag_at_fire_time() {
        let (state, platform, scheduler) = setup().await;
        scheduler.schedule(job(10));
        state
            .update(&CommunityId::from("g"), |r| r.reminders = false)
            .await;

        wait_fired(&scheduler, 1).await;
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_new_reminder_does_not_cancel_previous() {
        let (_state, platform, scheduler) = setup().await;
        scheduler.schedule(job(10));
        scheduler.schedule(job(20));

        wait_fired(&scheduler, 2).await;
        assert_eq!(platform.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_past_reminder_leaves_no_entry() {
        let (_state, platform, scheduler) = setup().await;
        for _ in 0..20 {
            scheduler.schedule(job(-1_000));
        }

        wait_fired(&scheduler, 20).await;
        assert_eq!(scheduler.fired_count(), 20);
        assert_eq!(platform.sent().len(), 20);
        assert!(scheduler.jobs.is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let (_state, platform, scheduler) = setup().await;
        scheduler.schedule(job(60_000));
        scheduler.schedule(job(60_000));
        assert_eq!(scheduler.pending_count(), 2);

        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(platform.sent().is_empty());
    }
}
