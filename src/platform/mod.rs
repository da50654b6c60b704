//! Messaging platform collaborator
//!
//! The core only needs a narrow slice of the platform: enumerate
//! communities, check send capability on a channel, send a message,
//! manage tier roles and create invites. [`Platform`] is that slice.

pub mod discord;
pub mod memory;

pub use discord::DiscordPlatform;
pub use memory::InMemoryPlatform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::fanout::Announcement;
use crate::types::{ChannelId, CommunityId, MemberId, Result, RoleId};

/// A role as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// Message posted into a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Announcement(Announcement),
    /// Cooldown elapsed; ping the member who last bumped
    Reminder { member: MemberId },
}

impl OutboundMessage {
    /// Plain text rendering
    pub fn content(&self) -> String {
        match self {
            OutboundMessage::Announcement(announcement) => announcement.render(),
            OutboundMessage::Reminder { member } => format!(
                "<@{}> It's time to bump! The cooldown is over, use /bump to keep your server at the top.",
                member
            ),
        }
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Every community the bot is a member of
    async fn list_communities(&self) -> Result<Vec<CommunityId>>;

    async fn community_name(&self, community: &CommunityId) -> Result<String>;

    /// Whether the bot may post into `channel`
    async fn can_send(&self, community: &CommunityId, channel: &ChannelId) -> Result<bool>;

    async fn send(&self, channel: &ChannelId, message: &OutboundMessage) -> Result<()>;

    async fn list_roles(&self, community: &CommunityId) -> Result<Vec<Role>>;

    async fn create_role(&self, community: &CommunityId, name: &str, color: u32) -> Result<Role>;

    async fn add_role(&self, community: &CommunityId, member: &MemberId, role: &RoleId)
        -> Result<()>;

    async fn remove_role(
        &self,
        community: &CommunityId,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<()>;

    /// Create a permanent invite link for `community`
    async fn create_invite(&self, community: &CommunityId) -> Result<String>;
}
