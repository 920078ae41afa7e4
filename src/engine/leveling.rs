// src/engine/leveling.rs

use crate::config::XP_PER_LEVEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelState {
    pub level: i64,
    pub xp_to_next_level: i64,
}

/// Level implied by a cumulative XP total: floor(xp / 1000) + 1.
pub fn level_for_xp(total_xp: i64) -> i64 {
    total_xp / XP_PER_LEVEL + 1
}

/// Recomputes the level from the XP total. The stored level is only ever
/// replaced by the maximum of itself and the computed level; it never
/// decreases, even if the XP total were corrected downward out of band.
pub fn recompute(stored_level: i64, total_xp: i64) -> LevelState {
    let level = stored_level.max(level_for_xp(total_xp));
    LevelState {
        level,
        xp_to_next_level: (level * XP_PER_LEVEL - total_xp).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_account_is_level_one() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(recompute(1, 0).xp_to_next_level, 1000);
    }

    #[test]
    fn crossing_a_thousand_levels_up() {
        // 950 XP + 100 XP attempt -> 1050 -> level 2, 950 to next level.
        let state = recompute(1, 1050);
        assert_eq!(state.level, 2);
        assert_eq!(state.xp_to_next_level, 950);
    }

    #[test]
    fn level_is_monotonic_in_xp() {
        let mut previous = 0;
        for xp in (0..10_000).step_by(137) {
            let level = level_for_xp(xp);
            assert!(level >= previous);
            previous = level;
            assert!(recompute(1, xp).xp_to_next_level >= 0);
        }
    }

    #[test]
    fn stored_level_never_decreases() {
        // XP corrected downward out of band: level holds.
        let state = recompute(5, 1200);
        assert_eq!(state.level, 5);
        assert_eq!(state.xp_to_next_level, 3800);
    }

    #[test]
    fn exact_threshold_starts_the_next_level() {
        let state = recompute(1, 1000);
        assert_eq!(state.level, 2);
        assert_eq!(state.xp_to_next_level, 1000);
    }
}
