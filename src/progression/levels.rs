//! Experience points and levels

use rand::Rng;

/// XP needed per level
pub const LEVEL_UP_XP: u64 = 1000;

/// Inclusive bounds of the XP awarded for one bump
pub const MIN_BUMP_XP: u64 = 1;
pub const MAX_BUMP_XP: u64 = 10;

pub fn level(xp: u64) -> u64 {
    xp / LEVEL_UP_XP
}

pub fn xp_to_next_level(xp: u64) -> u64 {
    LEVEL_UP_XP - (xp % LEVEL_UP_XP)
}

/// Uniformly random reward for a successful bump
pub fn random_xp<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.gen_range(MIN_BUMP_XP..=MAX_BUMP_XP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level(0), 0);
        assert_eq!(level(999), 0);
        assert_eq!(level(1999), 1);
        assert_eq!(level(2000), 2);
    }

    #[test]
    fn test_xp_to_next_level() {
        assert_eq!(xp_to_next_level(1999), 1);
        assert_eq!(xp_to_next_level(2000), 1000);
        assert_eq!(xp_to_next_level(0), 1000);
    }

    #[test]
    fn test_random_xp_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let xp = random_xp(&mut rng);
            assert!((MIN_BUMP_XP..=MAX_BUMP_XP).contains(&xp));
        }
    }
}
