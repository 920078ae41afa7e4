// src/models/achievement.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::error::AppError;

/// Represents the 'achievements' table. Definitions are authored by the
/// admin-content subsystem and read-only here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,

    // Raw requirement columns; parsed into `Requirement` before evaluation.
    pub requirement_type: String,
    pub requirement_value: i64,
    pub requirement_category: Option<String>,
    pub requirement_timeframe: String,

    pub xp_reward: i64,
    pub badge: Option<String>,
    pub is_active: bool,
    pub is_secret: bool,
    pub rarity: String,
}

/// Represents the 'user_achievements' table.
/// `UNIQUE (user_id, achievement_id)` makes grants idempotent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAchievement {
    pub id: i64,
    pub user_id: i64,
    pub achievement_id: i64,
    pub unlocked_at: chrono::DateTime<chrono::Utc>,
    /// 0-100 for progressive achievements.
    pub progress: i64,
    pub is_completed: bool,
    pub xp_earned: i64,
}

/// Closed union of achievement requirements, so evaluation is an exhaustive
/// match and a new requirement kind is a compile-time-checked change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Attempt percentage reaches the threshold.
    Score { min_percentage: i64 },
    /// Streak at attempt time reaches the threshold.
    Streak { days: i64 },
    /// Lifetime completed-attempt count reaches the threshold.
    Completion { count: i64 },
    /// Attempt finished in under the given number of seconds.
    Speed { max_seconds: i64 },
    /// Running average quiz score reaches the threshold.
    Accuracy { min_average: i64 },
    /// Learner level reaches the threshold.
    Level { level: i64 },
    /// XP within a timeframe reaches the threshold.
    Xp { amount: i64, timeframe: Timeframe },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl Timeframe {
    fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "daily" => Ok(Timeframe::Daily),
            "weekly" => Ok(Timeframe::Weekly),
            "monthly" => Ok(Timeframe::Monthly),
            "all-time" => Ok(Timeframe::AllTime),
            other => Err(AppError::InternalServerError(format!(
                "Unknown achievement timeframe '{}'",
                other
            ))),
        }
    }
}

impl Achievement {
    /// Parses the stored requirement columns into the closed union.
    /// Fails on unknown requirement types so bad seed data is caught loudly.
    pub fn requirement(&self) -> Result<Requirement, AppError> {
        let value = self.requirement_value;
        match self.requirement_type.as_str() {
            "score" => Ok(Requirement::Score {
                min_percentage: value,
            }),
            "streak" => Ok(Requirement::Streak { days: value }),
            "completion" => Ok(Requirement::Completion { count: value }),
            "speed" => Ok(Requirement::Speed { max_seconds: value }),
            "accuracy" => Ok(Requirement::Accuracy { min_average: value }),
            "level" => Ok(Requirement::Level { level: value }),
            "xp" => Ok(Requirement::Xp {
                amount: value,
                timeframe: Timeframe::parse(&self.requirement_timeframe)?,
            }),
            other => Err(AppError::InternalServerError(format!(
                "Unknown achievement requirement type '{}'",
                other
            ))),
        }
    }
}
