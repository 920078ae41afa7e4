// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'quiz_attempts' table in the database.
/// Rows are immutable once inserted; every aggregate is regenerable from them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,

    /// Per-question grading results, in presentation order.
    pub answers: Json<Vec<AttemptAnswer>>,

    /// Sum of points earned.
    pub score: i64,

    /// Rounded percentage of the maximum possible points.
    pub percentage: i64,

    /// Total time spent in seconds.
    pub time_spent: i64,

    pub passed: bool,

    /// The learner's streak value at the time of this attempt.
    pub streak: i64,

    pub xp_earned: i64,

    // Denormalized from the quiz for fast aggregation.
    pub difficulty: String,
    pub category: String,

    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// One graded answer inside an attempt record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub question_id: i64,
    pub selected_answer: String,
    pub is_correct: bool,
    /// Seconds spent on this question, as reported by the client.
    pub time_spent: i64,
    pub points_earned: i64,
}

/// DTO for submitting a quiz attempt.
/// Answers are positional: one entry per question, in question order.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    pub quiz_id: i64,
    #[validate(length(min = 1, message = "No answers submitted"))]
    pub answers: Vec<SubmittedAnswer>,
    /// Total elapsed seconds.
    pub time_spent: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub selected_answer: String,
    /// Seconds spent on this question.
    #[serde(default)]
    pub time_spent: i64,
}

/// Query parameters for the attempt history view.
#[derive(Debug, Deserialize)]
pub struct AttemptListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}
