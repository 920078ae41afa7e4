// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::HashMap;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,

    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stats: LearnerStats,
}

/// Gamification state embedded in the user's profile.
///
/// Mutated only through fixed UPDATE statements in the submit path and the
/// achievement grant path; there is no generic merge of client-supplied keys.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LearnerStats {
    pub streak: i64,
    pub longest_streak: i64,
    pub total_xp: i64,
    pub weekly_xp: i64,
    pub monthly_xp: i64,
    pub level: i64,
    pub xp_to_next_level: i64,
    pub streak_freezes: i64,
    pub quizzes_completed: i64,
    pub perfect_quizzes: i64,
    pub average_quiz_score: i64,
    pub daily_goal: i64,
    pub weekly_goal: i64,
    pub monthly_goal: i64,
    pub last_activity_date: Option<chrono::NaiveDate>,

    /// XP accumulated per quiz category.
    pub category_progress: Json<HashMap<String, i64>>,

    /// Ring buffer of the last 10 attempt summaries, newest first.
    /// Feeds the adaptive question selector.
    pub recent_quizzes: Json<Vec<RecentQuiz>>,

    /// Category names the learner underperforms in. Recomputed elsewhere
    /// from aggregate category performance.
    pub weak_areas: Json<Vec<String>>,
    pub strong_areas: Json<Vec<String>>,

    pub badges: Json<Vec<String>>,
}

/// One entry of the recent-attempts ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentQuiz {
    pub quiz_id: i64,
    /// Percentage scored on that attempt.
    pub score: i64,
    pub category: String,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
