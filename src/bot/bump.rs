//! Bump job
//!
//! What one dequeued bump does, in order: build the announcement with
//! the badge the community holds before this bump, fan it out, count the bump
//! and award XP, sync the member's tier role, then schedule a reminder
//! if the community wants one. Delivery and role failures never fail the
//! job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::fanout::{Announcement, BroadcastFanout, DeliveryReport};
use crate::platform::Platform;
use crate::progression::{
    badge_for, level, progress_bar, progress_percent, random_xp, sync_role_tier,
    xp_to_next_level,
};
use crate::queue::{JobHandler, QueueItem};
use crate::reminder::{ReminderJob, ReminderScheduler};
use crate::state::{BotState, CommunityRecord};
use crate::types::CommunityId;

/// Result of one processed bump
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BumpOutcome {
    pub community: CommunityId,
    pub delivery: DeliveryReport,
    pub total_bumps: u64,
    pub xp_gained: u64,
    pub level: u64,
    pub xp_to_next_level: u64,
    pub badge: Option<String>,
    /// Tier role the member holds after the bump, if sync succeeded
    pub role: Option<String>,
    pub reminder_at: Option<DateTime<Utc>>,
}

pub struct BumpWorker {
    state: Arc<BotState>,
    platform: Arc<dyn Platform>,
    fanout: BroadcastFanout,
    reminders: Arc<ReminderScheduler>,
    /// XP roll source
    rng: Mutex<StdRng>,
}

impl BumpWorker {
    pub fn new(
        state: Arc<BotState>,
        platform: Arc<dyn Platform>,
        reminders: Arc<ReminderScheduler>,
    ) -> Self {
        let fanout = BroadcastFanout::new(Arc::clone(&state), Arc::clone(&platform));
        Self {
            state,
            platform,
            fanout,
            reminders,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the XP roll source, e.g. with a seeded generator
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    fn roll_xp(&self) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        random_xp(&mut *rng)
    }

    pub fn delivery_totals(&self) -> DeliveryReport {
        self.fanout.totals()
    }

    async fn announcement(&self, item: &QueueItem, record: &CommunityRecord) -> Announcement {
        let community = item.community();
        let current = record.bumps.total;

        let name = match self.platform.community_name(community).await {
            Ok(name) => name,
            Err(e) => {
                warn!(community = %community, error = %e, "Could not resolve community name");
                community.to_string()
            }
        };

        Announcement {
            origin: community.clone(),
            community_name: name,
            description: record.description.clone(),
            banner_link: record.banner_link.clone(),
            invite_link: record.invite_link.clone(),
            badge: badge_for(current).map(|tier| tier.label()),
            progress: progress_percent(current)
                .map(|percent| format!("{} {:.2}%", progress_bar(percent, 10), percent)),
            actor: item.actor().clone(),
            total_bumps: current + 1,
            sent_at: Utc::now(),
        }
    }
}

#[async_trait]
impl JobHandler for BumpWorker {
    type Output = BumpOutcome;

    async fn handle(&self, item: &QueueItem) -> BumpOutcome {
        let community = item.community();
        let actor = item.actor();

        let record = self
            .state
            .get(community)
            .await
            .unwrap_or_else(|| CommunityRecord::new(community.clone()));

        let announcement = self.announcement(item, &record).await;
        let delivery = self.fanout.fanout(&announcement, community).await;

        let now = Utc::now();
        let waited_ms = (now - item.enqueued_at()).num_milliseconds();
        let xp_gained = self.roll_xp();
        let (total_bumps, xp, reminders) = self
            .state
            .update(community, |record| {
                record.record_bump(now);
                let member = record.member_mut(actor);
                member.bump_count += 1;
                member.xp += xp_gained;
                member.last_level = level(member.xp);
                let xp = member.xp;
                (record.bumps.total, xp, record.reminders)
            })
            .await;

        let member_level = level(xp);
        let role = match sync_role_tier(self.platform.as_ref(), community, actor, member_level).await
        {
            Ok(report) => report.assigned,
            Err(e) => {
                warn!(community = %community, member = %actor, error = %e, "Role sync failed");
                None
            }
        };

        let reminder_at = if reminders {
            let cooldown = chrono::Duration::from_std(item.cooldown())
                .unwrap_or_else(|_| chrono::Duration::zero());
            let fire_at = now + cooldown;
            self.reminders.schedule(ReminderJob {
                community: community.clone(),
                member: actor.clone(),
                fire_at,
            });
            Some(fire_at)
        } else {
            None
        };

        info!(
            community = %community,
            member = %actor,
            total_bumps,
            xp_gained,
            level = member_level,
            succeeded = delivery.succeeded,
            failed = delivery.failed,
            waited_ms,
            "Bump processed"
        );

        BumpOutcome {
            community: community.clone(),
            delivery,
            total_bumps,
            xp_gained,
            level: member_level,
            xp_to_next_level: xp_to_next_level(xp),
            badge: announcement.badge,
            role,
            reminder_at,
        }
    }
}
