//! Badge tiers keyed by cumulative bump count

/// One milestone bracket: `floor <= count < ceiling`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeTier {
    pub floor: u64,
    /// `None` for the terminal tier
    pub ceiling: Option<u64>,
    pub name: &'static str,
    pub symbol: &'static str,
}

pub const BADGE_TIERS: &[BadgeTier] = &[
    BadgeTier {
        floor: 10,
        ceiling: Some(100),
        name: "Junior Promoter",
        symbol: "🌱",
    },
    BadgeTier {
        floor: 100,
        ceiling: Some(1000),
        name: "Advanced Promoter",
        symbol: "📢",
    },
    BadgeTier {
        floor: 1000,
        ceiling: Some(10000),
        name: "Elite Promoter",
        symbol: "🚀",
    },
    BadgeTier {
        floor: 10000,
        ceiling: Some(10100),
        name: "Master Promoter",
        symbol: "👑",
    },
    BadgeTier {
        floor: 10100,
        ceiling: None,
        name: "Promotion Legend",
        symbol: "🔱",
    },
];

impl BadgeTier {
    pub fn label(&self) -> String {
        format!("{} {}", self.symbol, self.name)
    }

    fn contains(&self, count: u64) -> bool {
        count >= self.floor && self.ceiling.map_or(true, |ceiling| count < ceiling)
    }
}

/// Badge held at `count` bumps, if any
pub fn badge_for(count: u64) -> Option<&'static BadgeTier> {
    BADGE_TIERS.iter().find(|tier| tier.contains(count))
}

/// Percentage of the way from the current tier floor to the next one.
///
/// Below the first tier the span is `0..first.floor`. The terminal tier
/// has no next floor and returns `None`.
pub fn progress_percent(count: u64) -> Option<f64> {
    let (floor, next) = match badge_for(count) {
        Some(tier) => (tier.floor, tier.ceiling?),
        None => (0, BADGE_TIERS.first()?.floor),
    };

    let span = next.saturating_sub(floor);
    if span == 0 {
        return None;
    }

    let percent = (count.saturating_sub(floor)) as f64 / span as f64 * 100.0;
    Some(percent.clamp(0.0, 100.0))
}

/// Text progress bar, `width` cells wide
pub fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
