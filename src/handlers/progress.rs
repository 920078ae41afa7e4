// src/handlers/progress.rs
//
// Authenticated read views over attempts and learner stats, plus the
// streak-freeze purchase.

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder, prelude::FromRow};

use crate::{
    config::STREAK_FREEZE_COST,
    engine::leveling,
    error::AppError,
    models::{
        attempt::{AttemptListParams, QuizAttempt},
        user::User,
    },
    utils::jwt::Claims,
};

/// Per-category aggregate over the learner's attempts.
#[derive(Debug, Serialize, FromRow)]
struct CategoryStat {
    category: String,
    total_attempts: i64,
    average_score: i64,
    best_score: i64,
    total_xp: i64,
}

/// An unlocked (or in-progress) achievement joined with its definition.
#[derive(Debug, Serialize, FromRow)]
struct AchievementView {
    achievement_id: i64,
    name: String,
    description: String,
    icon: String,
    badge: Option<String>,
    rarity: String,
    progress: i64,
    is_completed: bool,
    unlocked_at: chrono::DateTime<chrono::Utc>,
}

/// Paginated attempt history, newest first, with optional
/// category/difficulty filters.
pub async fn get_user_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AttemptListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let mut count_query =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM quiz_attempts WHERE user_id = ");
    count_query.push_bind(user_id);
    push_attempt_filters(&mut count_query, &params);
    let total: i64 = count_query.build_query_scalar().fetch_one(&pool).await?;

    let mut list_query =
        QueryBuilder::<Postgres>::new("SELECT * FROM quiz_attempts WHERE user_id = ");
    list_query.push_bind(user_id);
    push_attempt_filters(&mut list_query, &params);
    list_query.push(" ORDER BY completed_at DESC LIMIT ");
    list_query.push_bind(limit);
    list_query.push(" OFFSET ");
    list_query.push_bind((page - 1) * limit);

    let attempts: Vec<QuizAttempt> = list_query.build_query_as().fetch_all(&pool).await?;

    Ok(Json(json!({
        "data": attempts,
        "pagination": {
            "current": page,
            "pages": (total + limit - 1) / limit,
            "total": total,
        }
    })))
}

fn push_attempt_filters(query: &mut QueryBuilder<Postgres>, params: &AttemptListParams) {
    if let Some(category) = params.category.as_deref().filter(|c| *c != "all") {
        query.push(" AND category = ");
        query.push_bind(category.to_string());
    }
    if let Some(difficulty) = params.difficulty.as_deref().filter(|d| *d != "all") {
        query.push(" AND difficulty = ");
        query.push_bind(difficulty.to_string());
    }
}

/// The learner's gamification dashboard: stats snapshot, recent attempts,
/// per-category aggregates, unlocked achievements and goals.
pub async fn get_user_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let recent_attempts = sqlx::query_as::<_, QuizAttempt>(
        "SELECT * FROM quiz_attempts WHERE user_id = $1 ORDER BY completed_at DESC LIMIT 5",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let category_stats = sqlx::query_as::<_, CategoryStat>(
        r#"
        SELECT
            category,
            COUNT(*) AS total_attempts,
            CAST(ROUND(AVG(percentage)) AS BIGINT) AS average_score,
            MAX(percentage) AS best_score,
            CAST(COALESCE(SUM(xp_earned), 0) AS BIGINT) AS total_xp
        FROM quiz_attempts
        WHERE user_id = $1
        GROUP BY category
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let achievements = sqlx::query_as::<_, AchievementView>(
        r#"
        SELECT
            ua.achievement_id, a.name, a.description, a.icon, a.badge, a.rarity,
            ua.progress, ua.is_completed, ua.unlocked_at
        FROM user_achievements ua
        JOIN achievements a ON a.id = ua.achievement_id
        WHERE ua.user_id = $1
        ORDER BY ua.unlocked_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "user": {
            "level": user.stats.level,
            "total_xp": user.stats.total_xp,
            "xp_to_next_level": user.stats.xp_to_next_level,
            "streak": user.stats.streak,
            "longest_streak": user.stats.longest_streak,
            "streak_freezes": user.stats.streak_freezes,
            "quizzes_completed": user.stats.quizzes_completed,
            "perfect_quizzes": user.stats.perfect_quizzes,
            "average_quiz_score": user.stats.average_quiz_score,
            "category_progress": user.stats.category_progress.0,
            "badges": user.stats.badges.0,
        },
        "achievements": achievements,
        "recent_attempts": recent_attempts,
        "category_stats": category_stats,
        "goals": {
            "daily": user.stats.daily_goal,
            "weekly": user.stats.weekly_goal,
            "monthly": user.stats.monthly_goal,
        }
    })))
}

/// Buys one streak-freeze token for a fixed XP cost.
///
/// The deduction is a single conditional UPDATE, so a concurrent purchase
/// can never drive the XP total negative. 409 when the learner cannot
/// afford it; no mutation happens in that case.
pub async fn purchase_streak_freeze(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let updated: Option<(i64, i64, i64)> = sqlx::query_as(
        r#"
        UPDATE users
        SET total_xp = total_xp - $1, streak_freezes = streak_freezes + 1
        WHERE id = $2 AND total_xp >= $1
        RETURNING total_xp, streak_freezes, level
        "#,
    )
    .bind(STREAK_FREEZE_COST)
    .bind(user_id)
    .fetch_optional(&pool)
    .await?;

    let Some((total_xp, streak_freezes, level)) = updated else {
        return Err(AppError::Conflict(format!(
            "Insufficient XP. Need {} XP to purchase a streak freeze.",
            STREAK_FREEZE_COST
        )));
    };

    // Spending XP widens the gap to the next level; the level itself never
    // moves backwards.
    let state = leveling::recompute(level, total_xp);
    sqlx::query("UPDATE users SET xp_to_next_level = $1 WHERE id = $2")
        .bind(state.xp_to_next_level)
        .bind(user_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({
        "message": "Streak freeze purchased",
        "streak_freezes": streak_freezes,
        "total_xp": total_xp,
        "xp_spent": STREAK_FREEZE_COST,
    })))
}
