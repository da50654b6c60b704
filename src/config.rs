//! Configuration for exobump
//!
//! CLI arguments and environment variable handling using clap.
//! `Args` is the process-facing surface; the library only sees [`BotConfig`].

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// exobump - cross-community bump broadcaster
#[derive(Parser, Debug, Clone)]
#[command(name = "exobump")]
#[command(about = "Broadcasts community promotions to every subscribed community")]
pub struct Args {
    /// Bot token for the messaging platform (required in production)
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,

    /// Base URL of the platform REST API
    #[arg(long, env = "DISCORD_API_URL", default_value = "https://discord.com/api/v10")]
    pub discord_api_url: String,

    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store, logging platform)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "exobump")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum number of bump broadcasts processed concurrently
    #[arg(long, env = "MAX_CONCURRENT_BUMPS", default_value = "5")]
    pub max_concurrent_bumps: usize,

    /// Cooldown between two bumps of the same community, in seconds
    #[arg(long, env = "BUMP_COOLDOWN_SECS", default_value = "3600")]
    pub bump_cooldown_secs: u64,

    /// Cooldown between two votes for the same community, in seconds
    #[arg(long, env = "VOTE_COOLDOWN_SECS", default_value = "86400")]
    pub vote_cooldown_secs: u64,

    /// Commands an actor may issue inside one rate-limit window
    #[arg(long, env = "RATE_LIMIT_MAX", default_value = "5")]
    pub rate_limit_max: usize,

    /// Rate-limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
    pub rate_limit_window_secs: u64,

    /// Interval between autosave attempts, in seconds
    #[arg(long, env = "AUTOSAVE_INTERVAL_SECS", default_value = "300")]
    pub autosave_interval_secs: u64,

    /// How long a bump request waits for its job before answering "queued"
    #[arg(long, env = "REPLY_TIMEOUT_MS", default_value = "2500")]
    pub reply_timeout_ms: u64,

    /// How long shutdown waits for queued bumps to finish, in seconds
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value = "30")]
    pub shutdown_grace_secs: u64,

    /// Outbound REST request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "15000")]
    pub request_timeout_ms: u64,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.discord_token.is_none() {
            return Err("DISCORD_TOKEN is required in production mode".to_string());
        }

        if self.max_concurrent_bumps == 0 {
            return Err("MAX_CONCURRENT_BUMPS must be at least 1".to_string());
        }

        if self.rate_limit_max == 0 {
            return Err("RATE_LIMIT_MAX must be at least 1".to_string());
        }

        if self.autosave_interval_secs == 0 {
            return Err("AUTOSAVE_INTERVAL_SECS must be at least 1".to_string());
        }

        Ok(())
    }

    /// Outbound REST request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Library-facing configuration
    pub fn bot_config(&self) -> BotConfig {
        BotConfig {
            max_concurrent_bumps: self.max_concurrent_bumps,
            bump_cooldown: Duration::from_secs(self.bump_cooldown_secs),
            vote_cooldown: Duration::from_secs(self.vote_cooldown_secs),
            rate_limit_max: self.rate_limit_max,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_secs),
            autosave_interval: Duration::from_secs(self.autosave_interval_secs),
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }
}

/// Runtime tunables for the bot core
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// BumpQueue concurrency limit
    pub max_concurrent_bumps: usize,
    /// Per-community broadcast cooldown
    pub bump_cooldown: Duration,
    /// Per-community vote cooldown
    pub vote_cooldown: Duration,
    /// Admissions allowed per actor inside the window
    pub rate_limit_max: usize,
    /// Sliding rate-limit window
    pub rate_limit_window: Duration,
    /// PersistenceSync interval
    pub autosave_interval: Duration,
    /// Wait for a bump job before replying with the queue position
    pub reply_timeout: Duration,
    /// Upper bound on draining the queue at shutdown
    pub shutdown_grace: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            max_concurrent_bumps: 5,
            bump_cooldown: Duration::from_secs(60 * 60),
            vote_cooldown: Duration::from_secs(24 * 60 * 60),
            rate_limit_max: 5,
            rate_limit_window: Duration::from_secs(60),
            autosave_interval: Duration::from_secs(5 * 60),
            reply_timeout: Duration::from_millis(2500),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}
