//! MongoDB client and transactional store
//!
//! Flushes run inside one multi-document transaction, which needs a
//! replica set (a single-node replica set is enough).

use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::{Client, ClientSession, Collection, IndexModel};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::schemas::{
    CommunityDoc, IntoIndexes, MemberDoc, COMMUNITY_COLLECTION, MEMBER_COLLECTION,
};
use super::{Store, StoreSnapshot};
use crate::types::{BumpError, Result};

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the server answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| BumpError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BumpError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Typed collection with its schema indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<Collection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        let collection = self.client.database(&self.db_name).collection::<T>(name);

        let indices: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        if !indices.is_empty() {
            collection
                .create_indexes(indices)
                .await
                .map_err(|e| BumpError::Database(format!("Failed to create indexes: {}", e)))?;
        }

        Ok(collection)
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Store backed by the `communities` and `members` collections
pub struct MongoStore {
    client: MongoClient,
    communities: Collection<CommunityDoc>,
    members: Collection<MemberDoc>,
}

impl MongoStore {
    pub async fn new(client: MongoClient) -> Result<Self> {
        let communities = client.collection::<CommunityDoc>(COMMUNITY_COLLECTION).await?;
        let members = client.collection::<MemberDoc>(MEMBER_COLLECTION).await?;
        Ok(Self {
            client,
            communities,
            members,
        })
    }

    /// Write one batch per collection inside the session's transaction.
    ///
    /// Each row is an upsert on the collection's natural key. `Client::bulk_write`
    /// would send a batch in one round trip but needs MongoDB 8.0, so rows go out
    /// one `update_one` at a time; atomicity comes from the transaction.
    async fn write_batch(
        &self,
        session: &mut ClientSession,
        snapshot: &StoreSnapshot,
    ) -> Result<()> {
        let communities = community_batch(&snapshot.communities)?;
        let members = member_batch(&snapshot.members)?;

        for row in communities {
            self.communities
                .update_one(row.filter, row.update)
                .upsert(true)
                .session(&mut *session)
                .await?;
        }
        for row in members {
            self.members
                .update_one(row.filter, row.update)
                .upsert(true)
                .session(&mut *session)
                .await?;
        }

        debug!(
            communities = snapshot.communities.len(),
            members = snapshot.members.len(),
            "Wrote batch to MongoDB"
        );
        Ok(())
    }
}

/// One upsert: match `filter`, `$set` the rest of the row
#[derive(Debug, Clone, PartialEq)]
struct Upsert {
    filter: Document,
    update: Document,
}

fn set_without_id<T: Serialize>(row: &T) -> Result<Document> {
    let mut set = bson::to_document(row)?;
    set.remove("_id");
    Ok(doc! { "$set": set })
}

fn community_batch(rows: &[CommunityDoc]) -> Result<Vec<Upsert>> {
    rows.iter()
        .map(|row| {
            Ok(Upsert {
                filter: doc! { "_id": row.id.as_str() },
                update: set_without_id(row)?,
            })
        })
        .collect()
}

fn member_batch(rows: &[MemberDoc]) -> Result<Vec<Upsert>> {
    rows.iter()
        .map(|row| {
            Ok(Upsert {
                filter: doc! {
                    "community_id": row.community_id.as_str(),
                    "member_id": row.member_id.as_str(),
                },
                update: set_without_id(row)?,
            })
        })
        .collect()
}

#[async_trait]
impl Store for MongoStore {
    async fn load_all(&self) -> Result<StoreSnapshot> {
        let communities: Vec<CommunityDoc> = self.communities.find(doc! {}).await?.try_collect().await?;
        let members: Vec<MemberDoc> = self.members.find(doc! {}).await?.try_collect().await?;

        debug!(
            communities = communities.len(),
            members = members.len(),
            "Loaded rows from MongoDB"
        );
        Ok(StoreSnapshot {
            communities,
            members,
        })
    }

    async fn upsert_all(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let mut session = self.client.inner().start_session().await?;
        session.start_transaction().await?;

        match self.write_batch(&mut session, snapshot).await {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    warn!(error = %abort, "Failed to abort transaction");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(community: &str, id: &str, xp: i64) -> MemberDoc {
        MemberDoc {
            oid: Some(bson::oid::ObjectId::new()),
            community_id: community.to_string(),
            member_id: id.to_string(),
            xp,
            ..Default::default()
        }
    }

    #[test]
    fn test_member_batch_keys_on_community_and_member() {
        let rows = vec![member("g", "a", 10), member("g", "b", 20), member("h", "a", 5)];
        let batch = member_batch(&rows).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(
            batch[2].filter,
            doc! { "community_id": "h", "member_id": "a" }
        );
        let set = batch[1].update.get_document("$set").unwrap();
        assert!(!set.contains_key("_id"));
        assert_eq!(set.get_i64("xp").unwrap(), 20);
    }

    #[test]
    fn test_empty_snapshot_builds_empty_batches() {
        assert!(community_batch(&[]).unwrap().is_empty());
        assert!(member_batch(&[]).unwrap().is_empty());
    }
}
