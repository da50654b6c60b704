//! Discord REST adapter
//!
//! `can_send` resolves the bot's effective permission in a channel from the
//! guild's roles and the channel's overwrites, in the order Discord applies
//! them: base role permissions, then the `@everyone` overwrite, then role
//! overwrites combined, then the member overwrite.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{OutboundMessage, Platform, Role};
use crate::types::{BumpError, ChannelId, CommunityId, MemberId, Result, RoleId};

/// Text and announcement channels accept messages
const SENDABLE_CHANNEL_TYPES: &[u8] = &[0, 5];

const ADMINISTRATOR: u64 = 1 << 3;
const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;
const ALL_PERMISSIONS: u64 = u64::MAX;

/// Overwrite `type`: 0 targets a role, 1 a member
const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;

#[derive(Debug, Deserialize)]
struct GuildSummary {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Guild {
    name: String,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    roles: Vec<RolePayload>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    guild_id: Option<String>,
    #[serde(default)]
    permission_overwrites: Vec<Overwrite>,
}

#[derive(Debug, Deserialize)]
struct Overwrite {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    id: String,
    name: String,
    #[serde(default)]
    permissions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GuildMember {
    #[serde(default)]
    roles: Vec<String>,
}

/// Permission bitfields arrive as decimal strings; unparseable means none
fn bits(field: &str) -> u64 {
    field.parse().unwrap_or(0)
}

/// Effective permissions of `member_id` in a channel of `guild_id`
fn effective_permissions(
    guild_id: &str,
    guild: &Guild,
    member_id: &str,
    member: &GuildMember,
    overwrites: &[Overwrite],
) -> u64 {
    if guild.owner_id.as_deref() == Some(member_id) {
        return ALL_PERMISSIONS;
    }

    let role_bits = |id: &str| {
        guild
            .roles
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.permissions.as_deref())
            .map(bits)
            .unwrap_or(0)
    };

    // The @everyone role shares the guild's id
    let mut permissions = role_bits(guild_id);
    for role in &member.roles {
        permissions |= role_bits(role);
    }
    if permissions & ADMINISTRATOR != 0 {
        return ALL_PERMISSIONS;
    }

    if let Some(everyone) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_ROLE && o.id == guild_id)
    {
        permissions &= !bits(&everyone.deny);
        permissions |= bits(&everyone.allow);
    }

    let (allow, deny) = overwrites
        .iter()
        .filter(|o| o.kind == OVERWRITE_ROLE && member.roles.contains(&o.id))
        .fold((0, 0), |(allow, deny), o| {
            (allow | bits(&o.allow), deny | bits(&o.deny))
        });
    permissions &= !deny;
    permissions |= allow;

    if let Some(own) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_MEMBER && o.id == member_id)
    {
        permissions &= !bits(&own.deny);
        permissions |= bits(&own.allow);
    }

    permissions
}

fn can_post(permissions: u64) -> bool {
    let required = VIEW_CHANNEL | SEND_MESSAGES;
    permissions & required == required
}

#[derive(Debug, Deserialize)]
struct InvitePayload {
    code: String,
}

pub struct DiscordPlatform {
    base_url: String,
    http_client: reqwest::Client,
    bot_user_id: OnceCell<String>,
}

impl DiscordPlatform {
    pub fn new(base_url: impl Into<String>, token: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|e| BumpError::Config(format!("Invalid bot token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("exobump/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            bot_user_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .http_client
            .get(self.url(path))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn bot_user_id(&self) -> Result<&str> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async move {
                let user: User = self.get_json("/users/@me").await?;
                Ok::<_, BumpError>(user.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn list_communities(&self) -> Result<Vec<CommunityId>> {
        let guilds: Vec<GuildSummary> = self.get_json("/users/@me/guilds").await?;
        Ok(guilds.into_iter().map(|g| CommunityId::new(g.id)).collect())
    }

    async fn community_name(&self, community: &CommunityId) -> Result<String> {
        let guild: Guild = self.get_json(&format!("/guilds/{}", community)).await?;
        Ok(guild.name)
    }

    async fn can_send(&self, community: &CommunityId, channel: &ChannelId) -> Result<bool> {
        let response = self
            .http_client
            .get(self.url(&format!("/channels/{}", channel)))
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(channel = %channel, status = %response.status(), "Channel not reachable");
            return Ok(false);
        }

        let channel_info: Channel = response.json().await?;
        if !SENDABLE_CHANNEL_TYPES.contains(&channel_info.kind)
            || channel_info.guild_id.as_deref() != Some(community.as_str())
        {
            return Ok(false);
        }

        let bot_id = self.bot_user_id().await?;
        let guild: Guild = self.get_json(&format!("/guilds/{}", community)).await?;
        let member: GuildMember = self
            .get_json(&format!("/guilds/{}/members/{}", community, bot_id))
            .await?;

        let permissions = effective_permissions(
            community.as_str(),
            &guild,
            bot_id,
            &member,
            &channel_info.permission_overwrites,
        );
        let allowed = can_post(permissions);
        if !allowed {
            debug!(channel = %channel, permissions, "Missing view or send permission");
        }
        Ok(allowed)
    }

    async fn send(&self, channel: &ChannelId, message: &OutboundMessage) -> Result<()> {
        self.http_client
            .post(self.url(&format!("/channels/{}/messages", channel)))
            .json(&json!({ "content": message.content() }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn list_roles(&self, community: &CommunityId) -> Result<Vec<Role>> {
        let roles: Vec<RolePayload> = self.get_json(&format!("/guilds/{}/roles", community)).await?;
        Ok(roles
            .into_iter()
            .map(|r| Role {
                id: RoleId::new(r.id),
                name: r.name,
            })
            .collect())
    }

    async fn create_role(&self, community: &CommunityId, name: &str, color: u32) -> Result<Role> {
        let role: RolePayload = self
            .http_client
            .post(self.url(&format!("/guilds/{}/roles", community)))
            .json(&json!({ "name": name, "color": color, "reason": "Bump level role" }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Role {
            id: RoleId::new(role.id),
            name: role.name,
        })
    }

    async fn add_role(
        &self,
        community: &CommunityId,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<()> {
        self.http_client
            .put(self.url(&format!(
                "/guilds/{}/members/{}/roles/{}",
                community, member, role
            )))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn remove_role(
        &self,
        community: &CommunityId,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<()> {
        self.http_client
            .delete(self.url(&format!(
                "/guilds/{}/members/{}/roles/{}",
                community, member, role
            )))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn create_invite(&self, community: &CommunityId) -> Result<String> {
        let channels: Vec<Channel> = self
            .get_json(&format!("/guilds/{}/channels", community))
            .await?;

        let channel = channels
            .into_iter()
            .find(|c| c.kind == 0)
            .ok_or_else(|| BumpError::NotFound(format!("No text channel in {}", community)))?;

        let invite: InvitePayload = self
            .http_client
            .post(self.url(&format!("/channels/{}/invites", channel.id)))
            .json(&json!({ "max_age": 0, "max_uses": 0, "unique": false }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(format!("https://discord.gg/{}", invite.code))
    }
}
