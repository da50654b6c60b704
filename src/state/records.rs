//! In-memory community and member records
//!
//! These are the mutable counters the bot accumulates. They are only
//! mutated through [`crate::state::BotState`], which marks them dirty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{ChannelId, CommunityId, MemberId};

/// Per-member progression counters inside one community
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub bump_count: u64,
    pub xp: u64,
    pub vote_count: u64,
    pub last_level: u64,
}

/// Bump counters over the calendar windows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BumpCounters {
    pub total: u64,
    pub today: u64,
    pub week: u64,
    pub month: u64,
}

/// Everything the bot knows about one community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub id: CommunityId,
    pub enabled: bool,
    /// Channel receiving broadcasts; bumps are declined while unset
    pub broadcast_channel: Option<ChannelId>,
    pub description: String,
    pub banner_link: String,
    pub reminders: bool,
    pub bumps: BumpCounters,
    pub last_broadcast_at: Option<DateTime<Utc>>,
    pub invite_link: String,
    /// Number of successful deliveries of other communities' broadcasts here
    pub ad_views: u64,
    pub vote_count: u64,
    pub last_vote_at: Option<DateTime<Utc>>,
    pub members: HashMap<MemberId, MemberRecord>,
}

impl CommunityRecord {
    /// Default record created on first interaction with a community
    pub fn new(id: CommunityId) -> Self {
        Self {
            id,
            enabled: true,
            broadcast_channel: None,
            description: String::new(),
            banner_link: String::new(),
            reminders: false,
            bumps: BumpCounters::default(),
            last_broadcast_at: None,
            invite_link: String::new(),
            ad_views: 0,
            vote_count: 0,
            last_vote_at: None,
            members: HashMap::new(),
        }
    }

    /// Member record, created on first qualifying action
    pub fn member_mut(&mut self, member: &MemberId) -> &mut MemberRecord {
        self.members.entry(member.clone()).or_default()
    }

    /// Count one completed broadcast
    pub fn record_bump(&mut self, at: DateTime<Utc>) {
        self.bumps.total += 1;
        self.bumps.today += 1;
        self.bumps.week += 1;
        self.bumps.month += 1;
        self.last_broadcast_at = Some(latest(self.last_broadcast_at, at));
    }

    /// Count one vote for this community by `member`
    pub fn record_vote(&mut self, member: &MemberId, at: DateTime<Utc>) {
        self.vote_count += 1;
        self.last_vote_at = Some(latest(self.last_vote_at, at));
        self.member_mut(member).vote_count += 1;
    }
}

// Timestamps never move backwards, even if the wall clock does.
fn latest(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    match current {
        Some(existing) if existing > candidate => existing,
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_record_defaults() {
        let record = CommunityRecord::new(CommunityId::from("1"));
        assert!(record.enabled);
        assert!(record.broadcast_channel.is_none());
        assert!(!record.reminders);
        assert_eq!(record.bumps, BumpCounters::default());
        assert!(record.members.is_empty());
    }

    #[test]
    fn test_record_bump_increments_every_window() {
        let mut record = CommunityRecord::new(CommunityId::from("1"));
        let now = Utc::now();
        record.record_bump(now);
        record.record_bump(now);

        assert_eq!(record.bumps.total, 2);
        assert_eq!(record.bumps.today, 2);
        assert_eq!(record.bumps.week, 2);
        assert_eq!(record.bumps.month, 2);
        assert_eq!(record.last_broadcast_at, Some(now));
    }

    #[test]
    fn test_last_broadcast_is_monotonic() {
        let mut record = CommunityRecord::new(CommunityId::from("1"));
        let now = Utc::now();
        record.record_bump(now);
        record.record_bump(now - Duration::minutes(5));
        assert_eq!(record.last_broadcast_at, Some(now));
    }

    #[test]
    fn test_record_vote_creates_member() {
        let mut record = CommunityRecord::new(CommunityId::from("1"));
        let member = MemberId::from("7");
        record.record_vote(&member, Utc::now());

        assert_eq!(record.vote_count, 1);
        assert_eq!(record.members[&member].vote_count, 1);
        assert_eq!(record.members[&member].bump_count, 0);
    }
}
