// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Quiz category (e.g., 'alphabet', 'phrases', 'family', 'mixed').
    pub category: String,

    /// Difficulty tier: 'Beginner', 'Intermediate' or 'Advanced'.
    pub difficulty: String,

    /// Ordered question value objects, stored as a JSON array.
    pub questions: Json<Vec<Question>>,

    /// Time limit in minutes.
    pub time_limit: i64,

    /// Passing score as a percentage.
    pub passing_score: i64,

    /// Maximum attempts per learner.
    pub max_attempts: i64,

    pub is_active: bool,
    pub tags: Json<Vec<String>>,

    // Rolling statistics, recomputed after each submission.
    pub total_attempts: i64,
    pub average_score: i64,
    pub completion_rate: i64,

    pub created_by: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A single question embedded in a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The question text.
    pub question: String,

    /// Question type: 'multiple-choice', 'true-false', 'matching' or 'fill-blank'.
    #[serde(rename = "type")]
    pub question_type: String,

    pub options: Vec<QuestionOption>,

    /// Canonical correct answer; correctness is an exact string match.
    pub correct_answer: String,

    pub explanation: Option<String>,

    /// Full point value awarded on a correct answer.
    pub points: i64,

    /// Topic category for adaptive selection. Falls back to the quiz's
    /// category when absent.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for sending a question to the client (answers and correctness stripped).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub options: Vec<String>,
    pub points: i64,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            question: q.question.clone(),
            question_type: q.question_type.clone(),
            options: q.options.iter().map(|o| o.text.clone()).collect(),
            points: q.points,
        }
    }
}

/// Quiz metadata without the question bodies, for list views.
#[derive(Debug, Serialize, FromRow)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub difficulty: String,
    pub question_count: i64,
    pub time_limit: i64,
    pub passing_score: i64,
    pub max_attempts: i64,
    pub total_attempts: i64,
    pub average_score: i64,
    pub completion_rate: i64,
}

/// Query parameters for the public quiz list.
#[derive(Debug, Deserialize, Validate)]
pub struct QuizListParams {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    #[validate(length(max = 100))]
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
