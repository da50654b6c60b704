//! Per-actor sliding-window rate limiter
//!
//! Each actor keeps the timestamps of its admitted commands inside the
//! trailing window. Entries are pruned lazily on every check. A rejected
//! attempt is not recorded, so a burst of `max` actions followed by
//! silence admits again as soon as the oldest one leaves the window.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::MemberId;

pub struct RateLimiter {
    max: usize,
    window: Duration,
    windows: Mutex<HashMap<MemberId, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit `actor` now, or reject if the window is full
    pub fn admit(&self, actor: &MemberId) -> bool {
        self.admit_at(actor, Instant::now())
    }

    /// Admission check against an explicit clock reading
    pub fn admit_at(&self, actor: &MemberId, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let stamps = windows.entry(actor.clone()).or_default();

        while let Some(oldest) = stamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() >= self.max {
            return false;
        }

        stamps.push_back(now);
        true
    }

    /// Drop actors with no timestamps left inside the window
    pub fn prune_idle(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, stamps| {
            stamps
                .back()
                .is_some_and(|latest| now.saturating_duration_since(*latest) < self.window)
        });
        before - windows.len()
    }

    /// Number of actors currently tracked
    pub fn tracked_actors(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(5, Duration::from_secs(60))
    }

    #[test]
    fn test_sixth_check_in_window_rejected() {
        let limiter = limiter();
        let actor = MemberId::from("alice");
        let start = Instant::now();

        let results: Vec<bool> = (0..6)
            .map(|i| limiter.admit_at(&actor, start + Duration::from_secs(i)))
            .collect();

        assert_eq!(results, vec![true, true, true, true, true, false]);
    }

    #[test]
    fn test_admitted_again_after_oldest_leaves_window() {
        let limiter = limiter();
        let actor = MemberId::from("alice");
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.admit_at(&actor, start + Duration::from_secs(i)));
        }
        assert!(!limiter.admit_at(&actor, start + Duration::from_secs(30)));

        // Oldest admitted stamp (t=0) is now outside the window
        assert!(limiter.admit_at(&actor, start + Duration::from_secs(60)));
        // t=1 is still inside, so the window is full again
        assert!(!limiter.admit_at(&actor, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let limiter = limiter();
        let actor = MemberId::from("alice");
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.admit_at(&actor, start));
        }
        // Hammering while limited must not extend the lockout
        for i in 1..50 {
            assert!(!limiter.admit_at(&actor, start + Duration::from_secs(i)));
        }
        assert!(limiter.admit_at(&actor, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_actors_are_independent() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.admit_at(&MemberId::from("alice"), start));
        }
        assert!(!limiter.admit_at(&MemberId::from("alice"), start));
        assert!(limiter.admit_at(&MemberId::from("bob"), start));
    }

    #[test]
    fn test_prune_idle() {
        let limiter = limiter();
        let start = Instant::now();
        limiter.admit_at(&MemberId::from("alice"), start);
        limiter.admit_at(&MemberId::from("bob"), start + Duration::from_secs(50));

        let removed = limiter.prune_idle(start + Duration::from_secs(70));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_actors(), 1);
    }
}
