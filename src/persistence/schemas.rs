//! Durable row schemas
//!
//! Counters are stored as `i64` because BSON has no unsigned integers.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

/// Collection name for communities
pub const COMMUNITY_COLLECTION: &str = "communities";

/// Collection name for members
pub const MEMBER_COLLECTION: &str = "members";

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// One community row, keyed by community id
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CommunityDoc {
    /// Community id (primary key)
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub broadcast_channel: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub banner_link: String,

    #[serde(default)]
    pub reminders: bool,

    #[serde(default)]
    pub bump_count: i64,

    #[serde(default)]
    pub bump_count_today: i64,

    #[serde(default)]
    pub bump_count_week: i64,

    #[serde(default)]
    pub bump_count_month: i64,

    #[serde(default)]
    pub invite_link: String,

    #[serde(default)]
    pub ad_views: i64,

    #[serde(default)]
    pub vote_count: i64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_vote: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_broadcast: Option<DateTime>,
}

fn default_enabled() -> bool {
    true
}

impl IntoIndexes for CommunityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Leaderboard ordering
            (
                doc! { "bump_count": -1 },
                Some(
                    IndexOptions::builder()
                        .name("bump_count_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

/// One member row, unique per (community, member)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MemberDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub oid: Option<ObjectId>,

    pub community_id: String,

    pub member_id: String,

    #[serde(default)]
    pub bump_count: i64,

    #[serde(default)]
    pub xp: i64,

    #[serde(default)]
    pub vote_count: i64,

    #[serde(default)]
    pub last_level: i64,
}

impl IntoIndexes for MemberDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "community_id": 1, "member_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("community_member_unique".to_string())
                    .build(),
            ),
        )]
    }
}
