//! Progression: badges, XP, levels and role tiers
//!
//! Everything here except role sync is a pure function of the counters.

pub mod badges;
pub mod levels;
pub mod roles;

pub use badges::{badge_for, progress_bar, progress_percent, BadgeTier, BADGE_TIERS};
pub use levels::{level, random_xp, xp_to_next_level, LEVEL_UP_XP};
pub use roles::{sync_role_tier, tier_for_level, RoleSyncReport, RoleTier, ROLE_TIERS};
