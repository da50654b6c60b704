//! Leaderboards and global statistics
//!
//! Pure functions over record snapshots. Community names are resolved by
//! the caller.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::progression::level;
use crate::state::CommunityRecord;
use crate::types::{CommunityId, MemberId};

pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerRank {
    pub rank: usize,
    pub community: CommunityId,
    pub name: String,
    pub bumps: u64,
    pub votes: u64,
    /// Share of all ad views, in percent
    pub reputation: f64,
    pub invite_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRank {
    pub rank: usize,
    pub member: MemberId,
    pub bumps: u64,
    pub xp: u64,
    pub level: u64,
    pub votes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalStats {
    /// Communities with at least one bump
    pub active_communities: u64,
    pub total_bumps: u64,
    pub total_votes: u64,
    pub total_ad_views: u64,
    pub bumps_today: u64,
    pub bumps_week: u64,
    pub bumps_month: u64,
    pub average_bumps: f64,
}

/// Communities ranked by bumps plus votes
pub fn top_servers(records: &[CommunityRecord], limit: usize) -> Vec<ServerRank> {
    let total_ad_views: u64 = records.iter().map(|r| r.ad_views).sum();

    let mut ranked: Vec<&CommunityRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        let score_a = a.bumps.total + a.vote_count;
        let score_b = b.bumps.total + b.vote_count;
        score_b.cmp(&score_a).then_with(|| a.id.cmp(&b.id))
    });

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, record)| ServerRank {
            rank: i + 1,
            community: record.id.clone(),
            name: record.id.to_string(),
            bumps: record.bumps.total,
            votes: record.vote_count,
            reputation: if total_ad_views > 0 {
                record.ad_views as f64 / total_ad_views as f64 * 100.0
            } else {
                0.0
            },
            invite_link: record.invite_link.clone(),
        })
        .collect()
}

/// Members of one community ranked by bump count
pub fn top_users(record: &CommunityRecord, limit: usize) -> Vec<UserRank> {
    let mut members: Vec<_> = record.members.iter().collect();
    members.sort_by(|(id_a, a), (id_b, b)| b.bump_count.cmp(&a.bump_count).then_with(|| id_a.cmp(id_b)));

    members
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (member, data))| UserRank {
            rank: i + 1,
            member: member.clone(),
            bumps: data.bump_count,
            xp: data.xp,
            level: level(data.xp),
            votes: data.vote_count,
        })
        .collect()
}

/// Totals over every active community. Window counters only count when
/// the community broadcast within that window.
pub fn global_stats(records: &[CommunityRecord], now: DateTime<Utc>) -> GlobalStats {
    let mut stats = GlobalStats::default();

    for record in records.iter().filter(|r| r.bumps.total > 0) {
        stats.active_communities += 1;
        stats.total_bumps += record.bumps.total;
        stats.total_votes += record.vote_count;
        stats.total_ad_views += record.ad_views;

        if let Some(last) = record.last_broadcast_at {
            let since = now - last;
            if since <= Duration::days(1) {
                stats.bumps_today += record.bumps.today;
            }
            if since <= Duration::days(7) {
                stats.bumps_week += record.bumps.week;
            }
            if since <= Duration::days(30) {
                stats.bumps_month += record.bumps.month;
            }
        }
    }

    if stats.active_communities > 0 {
        stats.average_bumps = stats.total_bumps as f64 / stats.active_communities as f64;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemberRecord;

    fn record(id: &str, bumps: u64, votes: u64, ad_views: u64) -> CommunityRecord {
        let mut r = CommunityRecord::new(CommunityId::from(id));
        r.bumps.total = bumps;
        r.vote_count = votes;
        r.ad_views = ad_views;
        r
    }

    #[test]
    fn test_top_servers_ordering_and_reputation() {
        let records = vec![record("a", 5, 0, 10), record("b", 3, 4, 30), record("c", 1, 0, 0)];
        let ranks = top_servers(&records, 2);

        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks[0].community.as_str(), "b");
        assert_eq!(ranks[0].rank, 1);
        assert!((ranks[0].reputation - 75.0).abs() < 1e-9);
        assert_eq!(ranks[1].community.as_str(), "a");
    }

    #[test]
    fn test_reputation_zero_without_views() {
        let ranks = top_servers(&[record("a", 1, 0, 0)], 10);
        assert_eq!(ranks[0].reputation, 0.0);
    }

    #[test]
    fn test_top_users() {
        let mut r = record("g", 0, 0, 0);
        r.members.insert(
            MemberId::from("low"),
            MemberRecord {
                bump_count: 1,
                xp: 5,
                ..Default::default()
            },
        );
        r.members.insert(
            MemberId::from("high"),
            MemberRecord {
                bump_count: 9,
                xp: 2100,
                ..Default::default()
            },
        );

        let ranks = top_users(&r, 10);
        assert_eq!(ranks[0].member.as_str(), "high");
        assert_eq!(ranks[0].level, 2);
        assert_eq!(ranks[1].rank, 2);
    }

    #[test]
    fn test_global_stats_windows() {
        let now = Utc::now();
        let mut recent = record("a", 4, 2, 7);
        recent.bumps.today = 1;
        recent.bumps.week = 2;
        recent.bumps.month = 4;
        recent.last_broadcast_at = Some(now - Duration::hours(2));

        let mut stale = record("b", 2, 0, 1);
        stale.bumps.today = 1;
        stale.bumps.week = 1;
        stale.bumps.month = 2;
        stale.last_broadcast_at = Some(now - Duration::days(10));

        let inactive = record("c", 0, 5, 0);

        let stats = global_stats(&[recent, stale, inactive], now);
        assert_eq!(stats.active_communities, 2);
        assert_eq!(stats.total_bumps, 6);
        assert_eq!(stats.total_votes, 2);
        assert_eq!(stats.total_ad_views, 8);
        assert_eq!(stats.bumps_today, 1);
        assert_eq!(stats.bumps_week, 2);
        assert_eq!(stats.bumps_month, 6);
        assert!((stats.average_bumps - 3.0).abs() < 1e-9);
    }
}
