//! Admission control
//!
//! The combined rate-limit and cooldown gate that decides whether a
//! request proceeds. A refusal is a [`Declined`] value, never an error.

pub mod cooldown;
pub mod rate_limiter;

pub use cooldown::{check_cooldown, format_remaining, CooldownStatus};
pub use rate_limiter::RateLimiter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::state::CommunityRecord;

/// Why a request was not admitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Declined {
    /// Actor exceeded the per-window command threshold
    RateLimited,
    /// The community has no broadcast channel configured
    ChannelNotConfigured,
    /// The community broadcast recently
    BumpCooldown { remaining_secs: u64 },
    /// The community was voted for recently
    VoteCooldown { remaining_secs: u64 },
}

impl Declined {
    /// Message shown to the requesting actor
    pub fn message(&self) -> String {
        match self {
            Declined::RateLimited => {
                "You are sending commands too quickly. Please wait a moment.".to_string()
            }
            Declined::ChannelNotConfigured => {
                "The bump channel is not configured for this server.".to_string()
            }
            Declined::BumpCooldown { remaining_secs } => format!(
                "You must wait {} before bumping again.",
                format_remaining(Duration::from_secs(*remaining_secs))
            ),
            Declined::VoteCooldown { remaining_secs } => format!(
                "You must wait {} before voting again.",
                format_remaining(Duration::from_secs(*remaining_secs))
            ),
        }
    }
}

/// Gate a broadcast request for `record`
pub fn admit_bump(
    record: &CommunityRecord,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Result<(), Declined> {
    if record.broadcast_channel.is_none() {
        return Err(Declined::ChannelNotConfigured);
    }

    let status = check_cooldown(record.last_broadcast_at, cooldown, now);
    if status.on_cooldown {
        return Err(Declined::BumpCooldown {
            remaining_secs: status.remaining.as_secs(),
        });
    }

    Ok(())
}

/// Gate a vote for `record`
pub fn admit_vote(
    record: &CommunityRecord,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Result<(), Declined> {
    let status = check_cooldown(record.last_vote_at, cooldown, now);
    if status.on_cooldown {
        return Err(Declined::VoteCooldown {
            remaining_secs: status.remaining.as_secs(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelId, CommunityId};

    const HOUR: Duration = Duration::from_secs(3600);

    fn configured() -> CommunityRecord {
        let mut record = CommunityRecord::new(CommunityId::from("1"));
        record.broadcast_channel = Some(ChannelId::from("c"));
        record
    }

    #[test]
    fn test_unconfigured_channel_declined_first() {
        let mut record = CommunityRecord::new(CommunityId::from("1"));
        let now = Utc::now();
        record.last_broadcast_at = Some(now);

        assert_eq!(
            admit_bump(&record, HOUR, now),
            Err(Declined::ChannelNotConfigured)
        );
    }

    #[test]
    fn test_bump_cooldown_declined() {
        let mut record = configured();
        let now = Utc::now();
        record.last_broadcast_at = Some(now - chrono::Duration::minutes(30));

        assert_eq!(
            admit_bump(&record, HOUR, now),
            Err(Declined::BumpCooldown {
                remaining_secs: 30 * 60
            })
        );
    }

    #[test]
    fn test_bump_admitted() {
        assert!(admit_bump(&configured(), HOUR, Utc::now()).is_ok());
    }

    #[test]
    fn test_vote_cooldown_independent_of_bump() {
        let mut record = configured();
        let now = Utc::now();
        record.last_broadcast_at = Some(now);
        assert!(admit_vote(&record, 24 * HOUR, now).is_ok());

        record.last_vote_at = Some(now - chrono::Duration::hours(1));
        assert!(matches!(
            admit_vote(&record, 24 * HOUR, now),
            Err(Declined::VoteCooldown { .. })
        ));
    }

    #[test]
    fn test_declined_message_formats_remaining() {
        let declined = Declined::BumpCooldown {
            remaining_secs: 90 * 60,
        };
        assert_eq!(
            declined.message(),
            "You must wait 1 hours and 30 minutes before bumping again."
        );
    }
}
