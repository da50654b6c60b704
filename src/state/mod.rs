//! Bot state owner
//!
//! `BotState` owns every community record and the process-wide dirty
//! tracker. Components receive it as an `Arc<BotState>`; there is no
//! ambient global state. All mutation goes through [`BotState::update`]
//! (or the helpers built on it) so the dirty flag can never be missed.

pub mod dirty;
pub mod records;

pub use dirty::{DirtyMark, DirtyTracker};
pub use records::{BumpCounters, CommunityRecord, MemberRecord};

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{ChannelId, CommunityId};

/// Calendar window whose counters are reset on a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl ResetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPeriod::Daily => "daily",
            ResetPeriod::Weekly => "weekly",
            ResetPeriod::Monthly => "monthly",
        }
    }
}

/// Owner of all in-memory community and member state
#[derive(Debug, Default)]
pub struct BotState {
    communities: RwLock<HashMap<CommunityId, CommunityRecord>>,
    dirty: DirtyTracker,
}

impl BotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    /// Create the default record for `id` if it does not exist yet.
    /// Returns true when a record was created.
    pub async fn ensure_community(&self, id: &CommunityId) -> bool {
        let mut communities = self.communities.write().await;
        if communities.contains_key(id) {
            return false;
        }
        communities.insert(id.clone(), CommunityRecord::new(id.clone()));
        self.dirty.mark();
        debug!(community = %id, "Created community record");
        true
    }

    /// Mutate one community record, creating it first if needed
    pub async fn update<F, R>(&self, id: &CommunityId, f: F) -> R
    where
        F: FnOnce(&mut CommunityRecord) -> R,
    {
        let mut communities = self.communities.write().await;
        let record = communities
            .entry(id.clone())
            .or_insert_with(|| CommunityRecord::new(id.clone()));
        let out = f(record);
        self.dirty.mark();
        out
    }

    pub async fn get(&self, id: &CommunityId) -> Option<CommunityRecord> {
        self.communities.read().await.get(id).cloned()
    }

    pub async fn community_count(&self) -> usize {
        self.communities.read().await.len()
    }

    /// Clone of every record, for persistence and reporting
    pub async fn snapshot(&self) -> Vec<CommunityRecord> {
        self.communities.read().await.values().cloned().collect()
    }

    /// Every community that has a broadcast channel configured
    pub async fn broadcast_targets(&self) -> Vec<(CommunityId, ChannelId)> {
        self.communities
            .read()
            .await
            .values()
            .filter_map(|record| {
                record
                    .broadcast_channel
                    .as_ref()
                    .map(|channel| (record.id.clone(), channel.clone()))
            })
            .collect()
    }

    /// Count one successful delivery into `recipient`
    pub async fn record_delivery(&self, recipient: &CommunityId) {
        let mut communities = self.communities.write().await;
        if let Some(record) = communities.get_mut(recipient) {
            record.ad_views += 1;
            self.dirty.mark();
        }
    }

    /// Replace all state with freshly loaded records. The result is clean.
    pub async fn replace_all(&self, records: Vec<CommunityRecord>) {
        let mut communities = self.communities.write().await;
        *communities = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        self.dirty.reset();
    }

    /// Zero the counters of one calendar window across all communities
    pub async fn reset_counters(&self, period: ResetPeriod) {
        let mut communities = self.communities.write().await;
        for record in communities.values_mut() {
            match period {
                ResetPeriod::Daily => record.bumps.today = 0,
                ResetPeriod::Weekly => record.bumps.week = 0,
                ResetPeriod::Monthly => {
                    record.bumps.month = 0;
                    record.vote_count = 0;
                }
            }
        }
        self.dirty.mark();
    }
}
