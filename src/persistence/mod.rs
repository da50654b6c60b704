//! Durable persistence
//!
//! The store only has to bulk read every row and bulk upsert a snapshot
//! transactionally. [`PersistenceSync`] drives it: hydration at startup,
//! then periodic flushes gated on the dirty tracker.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod sync;

pub use memory::InMemoryStore;
pub use mongo::{MongoClient, MongoStore};
pub use schemas::{CommunityDoc, IntoIndexes, MemberDoc};
pub use sync::{FlushOutcome, PersistenceSync};

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;

use crate::state::{BumpCounters, CommunityRecord, MemberRecord};
use crate::types::{ChannelId, CommunityId, MemberId, Result};

/// Durable store collaborator
#[async_trait]
pub trait Store: Send + Sync {
    /// Read every community and member row
    async fn load_all(&self) -> Result<StoreSnapshot>;

    /// Upsert every row in one transaction. Nothing is written on error.
    async fn upsert_all(&self, snapshot: &StoreSnapshot) -> Result<()>;
}

/// Flat rows for every entity kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub communities: Vec<CommunityDoc>,
    pub members: Vec<MemberDoc>,
}

impl StoreSnapshot {
    /// Flatten the nested in-memory records into rows
    pub fn from_records(records: &[CommunityRecord]) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.communities.push(CommunityDoc {
                id: record.id.to_string(),
                enabled: record.enabled,
                broadcast_channel: record.broadcast_channel.as_ref().map(|c| c.to_string()),
                description: record.description.clone(),
                banner_link: record.banner_link.clone(),
                reminders: record.reminders,
                bump_count: to_i64(record.bumps.total),
                bump_count_today: to_i64(record.bumps.today),
                bump_count_week: to_i64(record.bumps.week),
                bump_count_month: to_i64(record.bumps.month),
                invite_link: record.invite_link.clone(),
                ad_views: to_i64(record.ad_views),
                vote_count: to_i64(record.vote_count),
                last_vote: record.last_vote_at.map(bson::DateTime::from_chrono),
                last_broadcast: record.last_broadcast_at.map(bson::DateTime::from_chrono),
            });

            for (member_id, member) in &record.members {
                snapshot.members.push(MemberDoc {
                    oid: None,
                    community_id: record.id.to_string(),
                    member_id: member_id.to_string(),
                    bump_count: to_i64(member.bump_count),
                    xp: to_i64(member.xp),
                    vote_count: to_i64(member.vote_count),
                    last_level: to_i64(member.last_level),
                });
            }
        }
        snapshot
    }

    /// Rebuild the nested mapping. Members of unknown communities are dropped.
    pub fn into_records(self) -> Vec<CommunityRecord> {
        let mut records: HashMap<String, CommunityRecord> = self
            .communities
            .into_iter()
            .map(|doc| {
                let record = CommunityRecord {
                    id: CommunityId::new(doc.id.clone()),
                    enabled: doc.enabled,
                    broadcast_channel: doc.broadcast_channel.map(ChannelId::new),
                    description: doc.description,
                    banner_link: doc.banner_link,
                    reminders: doc.reminders,
                    bumps: BumpCounters {
                        total: to_u64(doc.bump_count),
                        today: to_u64(doc.bump_count_today),
                        week: to_u64(doc.bump_count_week),
                        month: to_u64(doc.bump_count_month),
                    },
                    last_broadcast_at: doc.last_broadcast.map(|t| t.to_chrono()),
                    invite_link: doc.invite_link,
                    ad_views: to_u64(doc.ad_views),
                    vote_count: to_u64(doc.vote_count),
                    last_vote_at: doc.last_vote.map(|t| t.to_chrono()),
                    members: HashMap::new(),
                };
                (doc.id, record)
            })
            .collect();

        let mut orphans = 0usize;
        for doc in self.members {
            match records.get_mut(&doc.community_id) {
                Some(record) => {
                    record.members.insert(
                        MemberId::new(doc.member_id),
                        MemberRecord {
                            bump_count: to_u64(doc.bump_count),
                            xp: to_u64(doc.xp),
                            vote_count: to_u64(doc.vote_count),
                            last_level: to_u64(doc.last_level),
                        },
                    );
                }
                None => orphans += 1,
            }
        }
        if orphans > 0 {
            warn!(orphans, "Dropped member rows without a community");
        }

        records.into_values().collect()
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn sample() -> CommunityRecord {
        let mut record = CommunityRecord::new(CommunityId::from("g1"));
        record.broadcast_channel = Some(ChannelId::from("c1"));
        record.description = "desc".to_string();
        record.reminders = true;
        record.bumps = BumpCounters {
            total: 12,
            today: 2,
            week: 5,
            month: 9,
        };
        // Millisecond precision survives BSON
        record.last_broadcast_at = DateTime::from_timestamp_millis(1_700_000_000_123);
        record.ad_views = 40;
        record.members.insert(
            MemberId::from("m1"),
            MemberRecord {
                bump_count: 3,
                xp: 1500,
                vote_count: 1,
                last_level: 1,
            },
        );
        record
    }

    #[test]
    fn test_rows_rebuild_nested_records() {
        let records = vec![sample()];
        let snapshot = StoreSnapshot::from_records(&records);
        assert_eq!(snapshot.communities.len(), 1);
        assert_eq!(snapshot.members.len(), 1);

        let rebuilt = snapshot.into_records();
        assert_eq!(rebuilt, records);
    }

    #[test]
    fn test_orphan_members_dropped() {
        let mut snapshot = StoreSnapshot::from_records(&[sample()]);
        snapshot.members.push(MemberDoc {
            community_id: "missing".to_string(),
            member_id: "m9".to_string(),
            ..Default::default()
        });

        let rebuilt = snapshot.into_records();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].members.len(), 1);
    }

    #[test]
    fn test_negative_counters_clamp_to_zero() {
        assert_eq!(to_u64(-5), 0);
        assert_eq!(to_i64(u64::MAX), i64::MAX);
    }
}
