//! exobump - cross-community bump broadcaster
//!
//! A member "bumps" their community; the bot announces it in the broadcast
//! channel of every subscribed community, awards XP and tier roles, and
//! reminds the community when the cooldown ends. State lives in memory and
//! is flushed to MongoDB in batches.

pub mod admission;
pub mod bot;
pub mod commands;
pub mod config;
pub mod fanout;
pub mod persistence;
pub mod platform;
pub mod progression;
pub mod queue;
pub mod reminder;
pub mod resets;
pub mod routes;
pub mod server;
pub mod state;
pub mod types;

pub use bot::Bot;
pub use config::{Args, BotConfig};
pub use server::{run, AppState};
pub use types::{BumpError, Result};
