//! In-memory platform
//!
//! Backs dev mode and tests. Messages are logged and recorded instead of
//! sent. Channels can be marked unsendable or failing to exercise the
//! fan-out isolation paths.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

use super::{OutboundMessage, Platform, Role};
use crate::types::{BumpError, ChannelId, CommunityId, MemberId, Result, RoleId};

#[derive(Default)]
pub struct InMemoryPlatform {
    names: DashMap<CommunityId, String>,
    channels: DashMap<ChannelId, CommunityId>,
    unsendable: DashSet<ChannelId>,
    failing: DashSet<ChannelId>,
    sent: Mutex<Vec<(ChannelId, OutboundMessage)>>,
    roles: DashMap<CommunityId, Vec<Role>>,
    member_roles: DashMap<(CommunityId, MemberId), HashSet<RoleId>>,
    next_id: AtomicU64,
    role_calls: AtomicU64,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_community(&self, community: impl Into<CommunityId>, name: &str) {
        self.names.insert(community.into(), name.to_string());
    }

    /// Register a text channel belonging to `community`
    pub fn add_channel(&self, community: impl Into<CommunityId>, channel: impl Into<ChannelId>) {
        self.channels.insert(channel.into(), community.into());
    }

    /// Bot lacks send permission in `channel`
    pub fn block_channel(&self, channel: impl Into<ChannelId>) {
        self.unsendable.insert(channel.into());
    }

    /// Deliveries to `channel` error out
    pub fn fail_channel(&self, channel: impl Into<ChannelId>) {
        self.failing.insert(channel.into());
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<(ChannelId, OutboundMessage)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of the roles `member` holds in `community`, sorted
    pub fn member_role_names(&self, community: &CommunityId, member: &MemberId) -> Vec<String> {
        let Some(held) = self
            .member_roles
            .get(&(community.clone(), member.clone()))
            .map(|r| r.clone())
        else {
            return Vec::new();
        };

        let mut names: Vec<String> = self
            .roles
            .get(community)
            .map(|roles| {
                roles
                    .iter()
                    .filter(|role| held.contains(&role.id))
                    .map(|role| role.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Roles defined on `community`
    pub fn role_count(&self, community: &CommunityId) -> usize {
        self.roles.get(community).map(|r| r.len()).unwrap_or(0)
    }

    /// Number of add/remove role calls made
    pub fn role_calls(&self) -> u64 {
        self.role_calls.load(Ordering::Relaxed)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn list_communities(&self) -> Result<Vec<CommunityId>> {
        let mut ids: Vec<CommunityId> = self.names.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn community_name(&self, community: &CommunityId) -> Result<String> {
        Ok(self
            .names
            .get(community)
            .map(|name| name.clone())
            .unwrap_or_else(|| community.to_string()))
    }

    async fn can_send(&self, community: &CommunityId, channel: &ChannelId) -> Result<bool> {
        if self.unsendable.contains(channel) {
            return Ok(false);
        }
        // Unregistered channels are accepted so tests need less setup
        Ok(self
            .channels
            .get(channel)
            .map_or(true, |owner| owner.value() == community))
    }

    async fn send(&self, channel: &ChannelId, message: &OutboundMessage) -> Result<()> {
        if self.failing.contains(channel) {
            return Err(BumpError::Platform(format!("Delivery to {} failed", channel)));
        }
        info!(channel = %channel, content = %message.content(), "Message sent");
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((channel.clone(), message.clone()));
        Ok(())
    }

    async fn list_roles(&self, community: &CommunityId) -> Result<Vec<Role>> {
        Ok(self
            .roles
            .get(community)
            .map(|roles| roles.clone())
            .unwrap_or_default())
    }

    async fn create_role(&self, community: &CommunityId, name: &str, _color: u32) -> Result<Role> {
        let role = Role {
            id: RoleId::new(self.next_id("role")),
            name: name.to_string(),
        };
        self.roles
            .entry(community.clone())
            .or_default()
            .push(role.clone());
        Ok(role)
    }

    async fn add_role(
        &self,
        community: &CommunityId,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<()> {
        self.role_calls.fetch_add(1, Ordering::Relaxed);
        self.member_roles
            .entry((community.clone(), member.clone()))
            .or_default()
            .insert(role.clone());
        Ok(())
    }

    async fn remove_role(
        &self,
        community: &CommunityId,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<()> {
        self.role_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(mut held) = self
            .member_roles
            .get_mut(&(community.clone(), member.clone()))
        {
            held.remove(role);
        }
        Ok(())
    }

    async fn create_invite(&self, community: &CommunityId) -> Result<String> {
        Ok(format!("https://invite.test/{}/{}", community, self.next_id("inv")))
    }
}
