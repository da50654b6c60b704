//! Shared types for exobump

pub mod error;
pub mod ids;

pub use error::{BumpError, Result};
pub use ids::{ChannelId, CommunityId, MemberId, RoleId};
