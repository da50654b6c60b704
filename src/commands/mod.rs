//! Command surface
//!
//! The bot understands a closed set of commands. An [`Interaction`]
//! carries one of them plus who issued it and where; every command
//! produces exactly one [`Reply`].

pub mod leaderboard;
pub mod validation;

pub use leaderboard::{global_stats, top_servers, top_users, GlobalStats, ServerRank, UserRank};
pub use validation::{CommunityProfile, ConfigRejection, ContentPolicy};

use serde::{Deserialize, Serialize};

use crate::admission::Declined;
use crate::bot::BumpOutcome;
use crate::queue::QueueStats;
use crate::types::{ChannelId, CommunityId, MemberId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    Bump,
    PingConfig,
    BumpToggle,
    BumpConfig {
        description: String,
        #[serde(default)]
        banner_link: String,
    },
    BumpSetChannel {
        channel: ChannelId,
    },
    BumpPreview,
    TopServer,
    TopUser,
    StatsBump,
    Vote,
    Help,
    Botinfo,
}

/// Catalogue entry for `help`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: &'static str,
    pub admin: bool,
    pub description: &'static str,
}

pub const CATALOGUE: &[CommandInfo] = &[
    CommandInfo {
        name: "bump",
        admin: false,
        description: "Broadcast this server to every partner server",
    },
    CommandInfo {
        name: "ping_config",
        admin: false,
        description: "Turn bump reminders on or off",
    },
    CommandInfo {
        name: "bump_toggle",
        admin: true,
        description: "Enable or disable the bot on this server",
    },
    CommandInfo {
        name: "bump_config",
        admin: true,
        description: "Set the server description and banner",
    },
    CommandInfo {
        name: "bump_set_channel",
        admin: true,
        description: "Choose the channel that receives broadcasts",
    },
    CommandInfo {
        name: "bump_preview",
        admin: true,
        description: "Preview the broadcast for this server",
    },
    CommandInfo {
        name: "top_server",
        admin: false,
        description: "Top 10 servers by bumps and votes",
    },
    CommandInfo {
        name: "top_user",
        admin: false,
        description: "Top 10 bumpers of this server",
    },
    CommandInfo {
        name: "stats_bump",
        admin: false,
        description: "Global bump statistics",
    },
    CommandInfo {
        name: "vote",
        admin: false,
        description: "Vote for this server once a day",
    },
    CommandInfo {
        name: "help",
        admin: false,
        description: "List available commands",
    },
    CommandInfo {
        name: "botinfo",
        admin: false,
        description: "Bot version, uptime and queue state",
    },
];

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Bump => "bump",
            Command::PingConfig => "ping_config",
            Command::BumpToggle => "bump_toggle",
            Command::BumpConfig { .. } => "bump_config",
            Command::BumpSetChannel { .. } => "bump_set_channel",
            Command::BumpPreview => "bump_preview",
            Command::TopServer => "top_server",
            Command::TopUser => "top_user",
            Command::StatsBump => "stats_bump",
            Command::Vote => "vote",
            Command::Help => "help",
            Command::Botinfo => "botinfo",
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Command::BumpToggle
                | Command::BumpConfig { .. }
                | Command::BumpSetChannel { .. }
                | Command::BumpPreview
        )
    }
}

/// One command issued by a member of a community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub community_id: CommunityId,
    pub actor_id: MemberId,
    /// Whether the actor holds administrator permission in the community
    #[serde(default)]
    pub actor_is_admin: bool,
    pub command: Command,
}

/// Runtime information for `botinfo`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotInfo {
    pub version: String,
    pub uptime_secs: u64,
    pub communities: usize,
    pub queue: QueueStats,
    pub pending_reminders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Admission refused; normal control flow
    Declined { declined: Declined, message: String },
    /// Admin command from a non-admin
    Forbidden { message: String },
    /// Configuration input refused
    Invalid { message: String },
    /// A setting changed
    Updated { message: String },
    /// Bump accepted but not finished within the reply timeout
    Queued { position: usize },
    Bumped(BumpOutcome),
    TopServers { entries: Vec<ServerRank> },
    TopUsers { entries: Vec<UserRank> },
    Stats(GlobalStats),
    Preview {
        title: String,
        description: String,
        banner_link: String,
    },
    Voted { vote_count: u64 },
    Help { commands: Vec<CommandInfo> },
    BotInfo(BotInfo),
    /// The request could not be completed
    Failed { message: String },
}

impl Reply {
    pub fn declined(declined: Declined) -> Self {
        let message = declined.message();
        Reply::Declined { declined, message }
    }

    pub fn updated(message: impl Into<String>) -> Self {
        Reply::Updated {
            message: message.into(),
        }
    }
}
