//! In-memory store for dev mode and tests
//!
//! Upserts are all-or-nothing, like the transactional MongoDB store.
//! Reads and writes can be made to fail on demand.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::{CommunityDoc, MemberDoc, Store, StoreSnapshot};
use crate::types::{BumpError, Result};

#[derive(Default)]
struct Tables {
    communities: HashMap<String, CommunityDoc>,
    members: HashMap<(String, String), MemberDoc>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    commits: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful upsert transactions
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn community_rows(&self) -> usize {
        self.tables.lock().await.communities.len()
    }

    pub async fn member_rows(&self) -> usize {
        self.tables.lock().await.members.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn load_all(&self) -> Result<StoreSnapshot> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BumpError::Database("Simulated read failure".to_string()));
        }

        let tables = self.tables.lock().await;
        let mut communities: Vec<CommunityDoc> = tables.communities.values().cloned().collect();
        communities.sort_by(|a, b| a.id.cmp(&b.id));
        let members = tables.members.values().cloned().collect();

        Ok(StoreSnapshot {
            communities,
            members,
        })
    }

    async fn upsert_all(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let mut tables = self.tables.lock().await;

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BumpError::Database(
                "Simulated write failure, transaction aborted".to_string(),
            ));
        }

        for community in &snapshot.communities {
            tables
                .communities
                .insert(community.id.clone(), community.clone());
        }
        for member in &snapshot.members {
            tables.members.insert(
                (member.community_id.clone(), member.member_id.clone()),
                member.clone(),
            );
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(xp: i64) -> StoreSnapshot {
        StoreSnapshot {
            communities: vec![CommunityDoc {
                id: "g".to_string(),
                enabled: true,
                ..Default::default()
            }],
            members: vec![MemberDoc {
                community_id: "g".to_string(),
                member_id: "m".to_string(),
                xp,
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_keys() {
        let store = InMemoryStore::new();
        store.upsert_all(&snapshot(1)).await.unwrap();
        store.upsert_all(&snapshot(2)).await.unwrap();

        assert_eq!(store.community_rows().await, 1);
        assert_eq!(store.member_rows().await, 1);
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.members[0].xp, 2);
        assert_eq!(store.commits(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_changes_nothing() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);

        assert!(store.upsert_all(&snapshot(1)).await.is_err());
        assert_eq!(store.community_rows().await, 0);
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_failed_read() {
        let store = InMemoryStore::new();
        store.set_fail_reads(true);
        assert!(store.load_all().await.is_err());
    }
}
