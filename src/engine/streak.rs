// src/engine/streak.rs

use chrono::NaiveDate;

/// Outcome of advancing a streak for "an attempt completed now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: i64,
    /// True when a freeze token covered a missed day; the caller must
    /// decrement the learner's token balance.
    pub freeze_consumed: bool,
}

/// Computes the new streak value at day granularity.
///
/// Rules, in order: activity already today leaves the streak unchanged;
/// activity yesterday extends it by one; otherwise a freeze token (if any)
/// covers the gap; otherwise the streak resets to 1, counting this attempt
/// as day one of the new streak.
pub fn advance(
    last_activity: Option<NaiveDate>,
    today: NaiveDate,
    current_streak: i64,
    freeze_tokens: i64,
) -> StreakUpdate {
    let yesterday = today.pred_opt();

    match last_activity {
        Some(last) if last == today => StreakUpdate {
            streak: current_streak,
            freeze_consumed: false,
        },
        Some(last) if Some(last) == yesterday => StreakUpdate {
            streak: current_streak + 1,
            freeze_consumed: false,
        },
        _ if freeze_tokens > 0 => StreakUpdate {
            streak: current_streak,
            freeze_consumed: true,
        },
        _ => StreakUpdate {
            streak: 1,
            freeze_consumed: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn yesterday_activity_extends_streak() {
        let today = date(2025, 6, 10);
        let update = advance(Some(date(2025, 6, 9)), today, 4, 0);
        assert_eq!(update.streak, 5);
        assert!(!update.freeze_consumed);
    }

    #[test]
    fn second_attempt_same_day_is_unchanged() {
        let today = date(2025, 6, 10);
        let update = advance(Some(today), today, 5, 2);
        assert_eq!(update.streak, 5);
        assert!(!update.freeze_consumed);
    }

    #[test]
    fn missed_day_with_freeze_preserves_streak() {
        let today = date(2025, 6, 10);
        let update = advance(Some(date(2025, 6, 7)), today, 8, 1);
        assert_eq!(update.streak, 8);
        assert!(update.freeze_consumed);
    }

    #[test]
    fn missed_day_without_freeze_resets_to_one() {
        let today = date(2025, 6, 10);
        let update = advance(Some(date(2025, 6, 7)), today, 8, 0);
        assert_eq!(update.streak, 1);
        assert!(!update.freeze_consumed);
    }

    #[test]
    fn first_ever_attempt_without_freeze_starts_at_one() {
        let today = date(2025, 6, 10);
        let update = advance(None, today, 0, 0);
        assert_eq!(update.streak, 1);
    }

    #[test]
    fn time_of_day_is_irrelevant_across_month_boundary() {
        let update = advance(Some(date(2025, 6, 30)), date(2025, 7, 1), 2, 0);
        assert_eq!(update.streak, 3);
    }
}
