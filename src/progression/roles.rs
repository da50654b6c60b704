//! Level role tiers
//!
//! A member holds exactly one tier role: the one at index `level - 1`.
//! Sync is idempotent. Roles are created lazily by name, and removing a
//! role the member does not hold is harmless.

use serde::Serialize;
use tracing::debug;

use crate::platform::Platform;
use crate::types::{CommunityId, MemberId, Result, RoleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTier {
    pub name: &'static str,
    pub color: u32,
}

pub const ROLE_TIERS: &[RoleTier] = &[
    RoleTier {
        name: "Beginner Bumper",
        color: 0xFF0000,
    },
    RoleTier {
        name: "Confirmed Bumper",
        color: 0x00FF00,
    },
    RoleTier {
        name: "Bump Master",
        color: 0x0000FF,
    },
    RoleTier {
        name: "Bump Legend",
        color: 0xFFFF00,
    },
    RoleTier {
        name: "Bump God",
        color: 0xFFA500,
    },
];

/// Tier a member at `level` should hold
pub fn tier_for_level(level: u64) -> Option<&'static RoleTier> {
    let index = usize::try_from(level.checked_sub(1)?).ok()?;
    ROLE_TIERS.get(index)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleSyncReport {
    pub created: usize,
    pub assigned: Option<String>,
    pub removed: usize,
}

/// Make `member` hold exactly the tier role for `level`
pub async fn sync_role_tier(
    platform: &dyn Platform,
    community: &CommunityId,
    member: &MemberId,
    level: u64,
) -> Result<RoleSyncReport> {
    let mut report = RoleSyncReport::default();
    let existing = platform.list_roles(community).await?;

    let mut tier_roles: Vec<RoleId> = Vec::with_capacity(ROLE_TIERS.len());
    for tier in ROLE_TIERS {
        let id = match existing.iter().find(|role| role.name == tier.name) {
            Some(role) => role.id.clone(),
            None => {
                let role = platform.create_role(community, tier.name, tier.color).await?;
                report.created += 1;
                role.id
            }
        };
        tier_roles.push(id);
    }

    let target = level
        .checked_sub(1)
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < tier_roles.len());

    for (index, role) in tier_roles.iter().enumerate() {
        if Some(index) == target {
            platform.add_role(community, member, role).await?;
            report.assigned = Some(ROLE_TIERS[index].name.to_string());
        } else {
            platform.remove_role(community, member, role).await?;
            report.removed += 1;
        }
    }

    debug!(
        community = %community,
        member = %member,
        level,
        assigned = ?report.assigned,
        "Role tier synced"
    );
    Ok(report)
}
