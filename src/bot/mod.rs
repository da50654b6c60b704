//! Bot wiring and command dispatch
//!
//! `Bot` owns the components and routes each [`Command`] to its handler
//! through a single `match`. Every command passes the rate limiter first,
//! and the community record is created lazily on first contact.

pub mod bump;

pub use bump::{BumpOutcome, BumpWorker};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admission::{admit_bump, admit_vote, Declined, RateLimiter};
use crate::commands::leaderboard::LEADERBOARD_SIZE;
use crate::commands::{
    global_stats, top_servers, top_users, BotInfo, Command, ContentPolicy, Interaction, Reply,
    CATALOGUE,
};
use crate::config::BotConfig;
use crate::fanout::DeliveryReport;
use crate::platform::Platform;
use crate::queue::{BumpQueue, QueueItem, QueueStats};
use crate::reminder::ReminderScheduler;
use crate::state::{BotState, CommunityRecord};
use crate::types::{CommunityId, MemberId, Result};

/// Events pushed by the platform outside of commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// The bot was added to a community
    CommunityJoined { community_id: CommunityId },
    /// An invite was deleted in a community
    InviteDeleted { community_id: CommunityId, url: String },
}

pub struct Bot {
    config: BotConfig,
    state: Arc<BotState>,
    platform: Arc<dyn Platform>,
    limiter: RateLimiter,
    worker: Arc<BumpWorker>,
    queue: Arc<BumpQueue<BumpWorker>>,
    reminders: Arc<ReminderScheduler>,
    policy: ContentPolicy,
    started_at: Instant,
}

impl Bot {
    pub fn new(config: BotConfig, state: Arc<BotState>, platform: Arc<dyn Platform>) -> Result<Self> {
        let reminders = Arc::new(ReminderScheduler::new(
            Arc::clone(&state),
            Arc::clone(&platform),
        ));
        let worker = Arc::new(BumpWorker::new(
            Arc::clone(&state),
            Arc::clone(&platform),
            Arc::clone(&reminders),
        ));
        let queue = BumpQueue::new(Arc::clone(&worker), config.max_concurrent_bumps);
        let limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);

        Ok(Self {
            config,
            state,
            platform,
            limiter,
            worker,
            queue,
            reminders,
            policy: ContentPolicy::new()?,
            started_at: Instant::now(),
        })
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Broadcast deliveries since startup
    pub fn delivery_totals(&self) -> DeliveryReport {
        self.worker.delivery_totals()
    }

    /// Actors currently tracked by the rate limiter
    pub fn rate_limited_actors(&self) -> usize {
        self.limiter.tracked_actors()
    }

    /// Drop rate-limit history of actors idle for a whole window
    pub fn prune_rate_limits(&self) -> usize {
        self.limiter.prune_idle(Instant::now())
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Wait until no bump is queued or running
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    /// Handle one command and produce its reply
    pub async fn dispatch(&self, interaction: Interaction) -> Reply {
        let Interaction {
            community_id,
            actor_id,
            actor_is_admin,
            command,
        } = interaction;

        if !self.limiter.admit(&actor_id) {
            debug!(actor = %actor_id, command = command.name(), "Rate limited");
            return Reply::declined(Declined::RateLimited);
        }

        self.state.ensure_community(&community_id).await;

        if command.requires_admin() && !actor_is_admin {
            return Reply::Forbidden {
                message: "You must be an administrator to use this command.".to_string(),
            };
        }

        debug!(community = %community_id, actor = %actor_id, command = command.name(), "Dispatching command");

        match command {
            Command::Bump => self.bump(community_id, actor_id).await,
            Command::PingConfig => {
                let enabled = self
                    .state
                    .update(&community_id, |r| {
                        r.reminders = !r.reminders;
                        r.reminders
                    })
                    .await;
                Reply::updated(format!(
                    "Bump reminders are now {}.",
                    if enabled { "enabled" } else { "disabled" }
                ))
            }
            Command::BumpToggle => {
                let enabled = self
                    .state
                    .update(&community_id, |r| {
                        r.enabled = !r.enabled;
                        r.enabled
                    })
                    .await;
                Reply::updated(format!(
                    "The bot is now {}.",
                    if enabled { "enabled" } else { "disabled" }
                ))
            }
            Command::BumpConfig {
                description,
                banner_link,
            } => match self.policy.check(&description, &banner_link) {
                Ok(profile) => {
                    self.state
                        .update(&community_id, |r| {
                            r.description = profile.description;
                            r.banner_link = profile.banner_link;
                        })
                        .await;
                    Reply::updated("Configuration updated.")
                }
                Err(rejection) => Reply::Invalid {
                    message: rejection.message(),
                },
            },
            Command::BumpSetChannel { channel } => {
                self.state
                    .update(&community_id, |r| r.broadcast_channel = Some(channel))
                    .await;
                Reply::updated("Bump channel configured.")
            }
            Command::BumpPreview => self.preview(&community_id).await,
            Command::TopServer => self.top_servers().await,
            Command::TopUser => {
                let entries = self
                    .state
                    .get(&community_id)
                    .await
                    .map(|record| top_users(&record, LEADERBOARD_SIZE))
                    .unwrap_or_default();
                Reply::TopUsers { entries }
            }
            Command::StatsBump => {
                let records = self.state.snapshot().await;
                Reply::Stats(global_stats(&records, Utc::now()))
            }
            Command::Vote => self.vote(&community_id, &actor_id).await,
            Command::Help => Reply::Help {
                commands: CATALOGUE.to_vec(),
            },
            Command::Botinfo => Reply::BotInfo(BotInfo {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: self.uptime_secs(),
                communities: self.state.community_count().await,
                queue: self.queue.stats(),
                pending_reminders: self.reminders.pending_count(),
            }),
        }
    }

    async fn bump(&self, community: CommunityId, actor: MemberId) -> Reply {
        let Some(record) = self.state.get(&community).await else {
            return Reply::declined(Declined::ChannelNotConfigured);
        };

        if let Err(declined) = admit_bump(&record, self.config.bump_cooldown, Utc::now()) {
            return Reply::declined(declined);
        }

        let ticket = self
            .queue
            .enqueue(QueueItem::new(actor, community, self.config.bump_cooldown));

        match tokio::time::timeout(self.config.reply_timeout, ticket.outcome).await {
            Ok(Ok(outcome)) => Reply::Bumped(outcome),
            Ok(Err(_)) => Reply::Failed {
                message: "The bump could not be completed.".to_string(),
            },
            Err(_) => Reply::Queued {
                position: ticket.position,
            },
        }
    }

    async fn vote(&self, community: &CommunityId, actor: &MemberId) -> Reply {
        let now = Utc::now();
        let Some(record) = self.state.get(community).await else {
            return Reply::Failed {
                message: "Community data is not available.".to_string(),
            };
        };

        if let Err(declined) = admit_vote(&record, self.config.vote_cooldown, now) {
            return Reply::declined(declined);
        }

        let vote_count = self
            .state
            .update(community, |r| {
                r.record_vote(actor, now);
                r.vote_count
            })
            .await;
        Reply::Voted { vote_count }
    }

    async fn preview(&self, community: &CommunityId) -> Reply {
        let record = self
            .state
            .get(community)
            .await
            .unwrap_or_else(|| CommunityRecord::new(community.clone()));
        let name = self.resolve_name(community).await;
        Reply::Preview {
            title: format!("Bump preview for {}", name),
            description: if record.description.is_empty() {
                "No description provided.".to_string()
            } else {
                record.description
            },
            banner_link: record.banner_link,
        }
    }

    async fn top_servers(&self) -> Reply {
        let records = self.state.snapshot().await;
        let mut entries = top_servers(&records, LEADERBOARD_SIZE);
        for entry in &mut entries {
            entry.name = self.resolve_name(&entry.community).await;
        }
        Reply::TopServers { entries }
    }

    async fn resolve_name(&self, community: &CommunityId) -> String {
        match self.platform.community_name(community).await {
            Ok(name) => name,
            Err(e) => {
                debug!(community = %community, error = %e, "Unknown community name");
                "Unknown server".to_string()
            }
        }
    }

    /// React to a platform event
    pub async fn handle_event(&self, event: PlatformEvent) -> Result<()> {
        match event {
            PlatformEvent::CommunityJoined { community_id } => {
                info!(community = %community_id, "Joined community");
                self.state.ensure_community(&community_id).await;
                self.refresh_invite(&community_id).await
            }
            PlatformEvent::InviteDeleted { community_id, url } => {
                let current = self
                    .state
                    .get(&community_id)
                    .await
                    .map(|record| record.invite_link)
                    .unwrap_or_default();
                if !current.is_empty() && current == url {
                    info!(community = %community_id, "Stored invite deleted, recreating");
                    self.refresh_invite(&community_id).await
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Create a fresh permanent invite. Ad views restart from zero.
    async fn refresh_invite(&self, community: &CommunityId) -> Result<()> {
        let link = self.platform.create_invite(community).await?;
        self.state
            .update(community, |r| {
                r.invite_link = link;
                r.ad_views = 0;
            })
            .await;
        Ok(())
    }

    /// Give every known community an invite if it has none.
    ///
    /// Returns the number of invites created.
    pub async fn ensure_invites(&self) -> Result<usize> {
        let mut created = 0;
        for community in self.platform.list_communities().await? {
            self.state.ensure_community(&community).await;
            let has_invite = self
                .state
                .get(&community)
                .await
                .is_some_and(|record| !record.invite_link.is_empty());
            if has_invite {
                continue;
            }
            match self.refresh_invite(&community).await {
                Ok(()) => created += 1,
                Err(e) => warn!(community = %community, error = %e, "Failed to create invite"),
            }
        }
        Ok(created)
    }

    /// Drain the bump queue, then stop background work owned by the bot.
    ///
    /// Returns `false` if bumps were still queued or running when the
    /// grace period ran out.
    pub async fn shutdown(&self) -> bool {
        let grace = self.config.shutdown_grace;
        let drained = tokio::time::timeout(grace, self.wait_idle()).await.is_ok();
        if !drained {
            let stats = self.queue_stats();
            warn!(
                depth = stats.depth,
                in_flight = stats.in_flight,
                grace_secs = grace.as_secs(),
                "Shutdown grace elapsed with bumps still pending"
            );
        }
        self.reminders.cancel_all();
        drained
    }
}

/// Periodically forget idle actors in the rate limiter
pub fn spawn_cleanup_task(bot: Arc<Bot>, interval: Duration) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = bot.prune_rate_limits();
            debug!(
                removed,
                tracked = bot.rate_limited_actors(),
                "Rate limiter cleanup completed"
            );
        }
    });

    info!("Rate limiter cleanup task started");
    handle
}
