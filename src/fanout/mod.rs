//! Broadcast fan-out
//!
//! Delivers one announcement to every community with a broadcast channel
//! configured, the origin included. Each recipient is attempted
//! independently: one unreachable channel never stops the others. The
//! caller only gets aggregate counts; individual failures are logged.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::platform::{OutboundMessage, Platform};
use crate::state::BotState;
use crate::types::{CommunityId, MemberId};

/// The promotion posted into every recipient channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub origin: CommunityId,
    pub community_name: String,
    pub description: String,
    pub banner_link: String,
    pub invite_link: String,
    /// Badge label earned with this bump, if any
    pub badge: Option<String>,
    /// Progress bar toward the next badge
    pub progress: Option<String>,
    pub actor: MemberId,
    pub total_bumps: u64,
    pub sent_at: DateTime<Utc>,
}

impl Announcement {
    /// Plain text body
    pub fn render(&self) -> String {
        let mut out = format!("**{}**", self.community_name);
        if let Some(badge) = &self.badge {
            out.push_str(&format!(" | {}", badge));
        }
        out.push_str("\n\n");
        out.push_str(&self.description);
        if let Some(progress) = &self.progress {
            out.push_str(&format!("\n\nProgress to next badge: {}", progress));
        }
        out.push_str(&format!("\n\nTotal bumps: {}", self.total_bumps));
        if !self.invite_link.is_empty() {
            out.push_str(&format!("\nJoin: {}", self.invite_link));
        }
        if !self.banner_link.is_empty() {
            out.push_str(&format!("\n{}", self.banner_link));
        }
        out.push_str(&format!("\nBumped by <@{}>", self.actor));
        out
    }
}

/// Aggregate result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct BroadcastFanout {
    state: Arc<BotState>,
    platform: Arc<dyn Platform>,
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

impl BroadcastFanout {
    pub fn new(state: Arc<BotState>, platform: Arc<dyn Platform>) -> Self {
        Self {
            state,
            platform,
            delivered: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Deliveries since startup
    pub fn totals(&self) -> DeliveryReport {
        DeliveryReport {
            succeeded: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Deliver `announcement` to every eligible recipient channel.
    ///
    /// Channels the bot cannot send to are skipped without counting as a
    /// failure. Each successful delivery bumps the recipient's ad views.
    pub async fn fanout(&self, announcement: &Announcement, origin: &CommunityId) -> DeliveryReport {
        let targets = self.state.broadcast_targets().await;
        let message = OutboundMessage::Announcement(announcement.clone());

        let deliveries = targets.into_iter().map(|(recipient, channel)| {
            let platform = Arc::clone(&self.platform);
            let message = &message;
            async move {
                match platform.can_send(&recipient, &channel).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(recipient = %recipient, channel = %channel, "Skipping channel without send permission");
                        return None;
                    }
                    Err(e) => {
                        warn!(recipient = %recipient, channel = %channel, error = %e, "Send capability check failed");
                        return Some((recipient, false));
                    }
                }

                match platform.send(&channel, message).await {
                    Ok(()) => Some((recipient, true)),
                    Err(e) => {
                        warn!(recipient = %recipient, channel = %channel, error = %e, "Broadcast delivery failed");
                        Some((recipient, false))
                    }
                }
            }
        });

        let mut report = DeliveryReport::default();
        for (recipient, delivered) in join_all(deliveries).await.into_iter().flatten() {
            if delivered {
                self.state.record_delivery(&recipient).await;
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        self.delivered.fetch_add(report.succeeded, Ordering::Relaxed);
        self.failed.fetch_add(report.failed, Ordering::Relaxed);

        info!(
            origin = %origin,
            succeeded = report.succeeded,
            failed = report.failed,
            "Broadcast fan-out complete"
        );
        report
    }
}
