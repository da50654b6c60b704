//! Timestamp-based cooldown gate
//!
//! Stateless: the last action time lives on the community record. The
//! same check covers the broadcast cooldown and the vote cooldown.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub on_cooldown: bool,
    /// Time left until the action is allowed again; zero when not on cooldown
    pub remaining: Duration,
}

/// Check whether an action last taken at `last` is still cooling down
pub fn check_cooldown(
    last: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> CooldownStatus {
    let ready = CooldownStatus {
        on_cooldown: false,
        remaining: Duration::ZERO,
    };

    let Some(last) = last else {
        return ready;
    };

    // A timestamp in the future counts as "just now"
    let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
    if elapsed >= cooldown {
        return ready;
    }

    CooldownStatus {
        on_cooldown: true,
        remaining: cooldown - elapsed,
    }
}

/// Render a remaining duration in the coarsest useful unit
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{} and {}", unit(hours, "hour"), unit(minutes, "minute"))
    } else if minutes > 0 {
        unit(minutes, "minute")
    } else {
        unit(seconds, "second")
    }
}

fn unit(count: u64, name: &str) -> String {
    if count > 1 {
        format!("{} {}s", count, name)
    } else {
        format!("{} {}", count, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_half_elapsed_is_on_cooldown() {
        let now = Utc::now();
        let status = check_cooldown(Some(now - chrono::Duration::minutes(30)), HOUR, now);
        assert!(status.on_cooldown);
        assert_eq!(status.remaining, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_fully_elapsed_is_ready() {
        let now = Utc::now();
        let status = check_cooldown(Some(now - chrono::Duration::hours(2)), HOUR, now);
        assert!(!status.on_cooldown);
        assert_eq!(status.remaining, Duration::ZERO);
    }

    #[test]
    fn test_never_acted_is_ready() {
        assert!(!check_cooldown(None, HOUR, Utc::now()).on_cooldown);
    }

    #[test]
    fn test_future_timestamp_is_full_cooldown() {
        let now = Utc::now();
        let status = check_cooldown(Some(now + chrono::Duration::minutes(5)), HOUR, now);
        assert!(status.on_cooldown);
        assert_eq!(status.remaining, HOUR);
    }

    #[test]
    fn test_format_remaining_units() {
        assert_eq!(
            format_remaining(Duration::from_secs(2 * 3600 + 5 * 60)),
            "2 hours and 5 minutes"
        );
        assert_eq!(format_remaining(Duration::from_secs(30 * 60 + 10)), "30 minutes");
        assert_eq!(format_remaining(Duration::from_secs(42)), "42 seconds");
    }

    #[test]
    fn test_format_remaining_singular_units() {
        assert_eq!(
            format_remaining(Duration::from_secs(3600 + 30 * 60)),
            "1 hour and 30 minutes"
        );
        assert_eq!(
            format_remaining(Duration::from_secs(2 * 3600 + 60)),
            "2 hours and 1 minute"
        );
        assert_eq!(format_remaining(Duration::from_secs(60 + 5)), "1 minute");
        assert_eq!(format_remaining(Duration::from_secs(1)), "1 second");
    }
}
