// src/handlers/quiz.rs
//
// Public quiz views plus the attempt lifecycle: eligibility-gated start with
// adaptive question selection, and the submission orchestrator that scores
// the attempt, advances streak and level, persists the immutable attempt
// row, applies learner-stat deltas, grants achievements and refreshes the
// quiz's rolling statistics.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    engine::{
        achievement::{AttemptFacts, StatsFacts, evaluate},
        leveling, scoring,
        scoring::ScoreOutcome,
        selector::select_questions,
        streak,
        streak::StreakUpdate,
    },
    error::AppError,
    models::{
        achievement::{Achievement, UserAchievement},
        attempt::SubmitQuizRequest,
        quiz::{PublicQuestion, Quiz, QuizListParams, QuizSummary},
        user::{RecentQuiz, User},
    },
    utils::jwt::Claims,
};

/// Prior category passes required to start an Intermediate quiz.
const INTERMEDIATE_REQUIRED_PASSES: i64 = 2;
/// Prior category passes required to start an Advanced quiz.
const ADVANCED_REQUIRED_PASSES: i64 = 3;

/// Size of the recent-attempts ring buffer on the learner profile.
const RECENT_QUIZZES_KEPT: usize = 10;

/// Lists active quizzes with optional category/difficulty/search filters
/// and page-based pagination.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = params.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100); // Default 10, max 100

    let mut count_query =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM quizzes WHERE is_active = TRUE");
    push_quiz_filters(&mut count_query, &params);
    let total: i64 = count_query.build_query_scalar().fetch_one(&pool).await?;

    let mut list_query = QueryBuilder::<Postgres>::new(
        r#"
        SELECT
            id, title, description, category, difficulty,
            CAST(jsonb_array_length(questions) AS BIGINT) AS question_count,
            time_limit, passing_score, max_attempts,
            total_attempts, average_score, completion_rate
        FROM quizzes
        WHERE is_active = TRUE
        "#,
    );
    push_quiz_filters(&mut list_query, &params);
    list_query.push(" ORDER BY created_at DESC LIMIT ");
    list_query.push_bind(limit);
    list_query.push(" OFFSET ");
    list_query.push_bind((page - 1) * limit);

    let quizzes: Vec<QuizSummary> = list_query.build_query_as().fetch_all(&pool).await?;

    Ok(Json(json!({
        "data": quizzes,
        "pagination": {
            "current": page,
            "pages": (total + limit - 1) / limit,
            "total": total,
        }
    })))
}

fn push_quiz_filters(query: &mut QueryBuilder<Postgres>, params: &QuizListParams) {
    if let Some(category) = params.category.as_deref().filter(|c| *c != "all") {
        query.push(" AND category = ");
        query.push_bind(category.to_string());
    }
    if let Some(difficulty) = params.difficulty.as_deref().filter(|d| *d != "all") {
        query.push(" AND difficulty = ");
        query.push_bind(difficulty.to_string());
    }
    if let Some(search) = params.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query.push(" AND (title ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

/// Fetches one quiz with its questions sanitized (no answers, no
/// correctness flags). 403 for inactive quizzes.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, id).await?;

    if !quiz.is_active {
        return Err(AppError::Forbidden("Quiz is not available".to_string()));
    }

    let questions: Vec<PublicQuestion> = quiz.questions.0.iter().map(PublicQuestion::from).collect();

    Ok(Json(json!({
        "id": quiz.id,
        "title": quiz.title,
        "description": quiz.description,
        "category": quiz.category,
        "difficulty": quiz.difficulty,
        "time_limit": quiz.time_limit,
        "passing_score": quiz.passing_score,
        "max_attempts": quiz.max_attempts,
        "tags": quiz.tags.0,
        "questions": questions,
        "stats": {
            "total_attempts": quiz.total_attempts,
            "average_score": quiz.average_score,
            "completion_rate": quiz.completion_rate,
        }
    })))
}

/// Starts an attempt: checks the difficulty gate and the attempt limit,
/// then runs the adaptive selector over the learner's recent history.
///
/// Eligibility is enforced here, at attempt start; submission itself does
/// not re-gate.
pub async fn start_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quiz = fetch_quiz(&pool, id).await?;
    if !quiz.is_active {
        return Err(AppError::Forbidden("Quiz is not available".to_string()));
    }

    // Higher difficulties unlock after enough passes in the same category.
    let required_passes = match quiz.difficulty.as_str() {
        "Intermediate" => Some(INTERMEDIATE_REQUIRED_PASSES),
        "Advanced" => Some(ADVANCED_REQUIRED_PASSES),
        _ => None,
    };
    if let Some(required) = required_passes {
        let passes: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND category = $2 AND passed = TRUE",
        )
        .bind(user_id)
        .bind(&quiz.category)
        .fetch_one(&pool)
        .await?;

        if passes < required {
            return Err(AppError::Forbidden(format!(
                "Unlock requirement: pass {} {} quizzes to access {} (currently {})",
                required, quiz.category, quiz.difficulty, passes
            )));
        }
    }

    let attempts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2")
            .bind(user_id)
            .bind(quiz.id)
            .fetch_one(&pool)
            .await?;
    if attempts >= quiz.max_attempts {
        return Err(AppError::Forbidden(
            "Maximum attempts reached for this quiz".to_string(),
        ));
    }

    let user = fetch_user(&pool, user_id).await?;

    // ThreadRng is not Send; keep it out of scope before the next await.
    let questions = {
        let mut rng = rand::rng();
        select_questions(
            &quiz.questions.0,
            &quiz.category,
            &user.stats.recent_quizzes.0,
            &user.stats.weak_areas.0,
            &user.stats.strong_areas.0,
            &mut rng,
        )
    };
    let questions: Vec<PublicQuestion> = questions.iter().map(PublicQuestion::from).collect();

    let xp_today = xp_earned_today(&pool, user_id).await?;

    Ok(Json(json!({
        "quiz_id": quiz.id,
        "title": quiz.title,
        "description": quiz.description,
        "time_limit": quiz.time_limit,
        "total_questions": questions.len(),
        "questions": questions,
        "attempt_number": attempts + 1,
        "max_attempts": quiz.max_attempts,
        "learning": {
            "streak": user.stats.streak,
            "daily_goal": user.stats.daily_goal,
            "xp_today": xp_today,
        }
    })))
}

/// Submits an attempt and runs the full orchestration:
/// score -> streak -> level -> persist attempt -> learner-stat deltas ->
/// achievements -> quiz rolling stats -> result payload.
///
/// The attempt row is the source of truth. Once it is inserted, a failure
/// in any later step is logged for reconciliation and does not fail the
/// submission; every aggregate is regenerable from the attempt records.
pub async fn submit_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, req.quiz_id).await?;
    let user = fetch_user(&pool, user_id).await?;
    let prev_level = user.stats.level;

    // Steps 2-4: pure computation. Any failure here commits nothing.
    let outcome = scoring::grade(&quiz, &req.answers, req.time_spent)?;

    let now = Utc::now();
    let today = now.date_naive();
    let streak_update = streak::advance(
        user.stats.last_activity_date,
        today,
        user.stats.streak,
        user.stats.streak_freezes,
    );

    // Step 5: persist the immutable attempt record.
    let (attempt_id, completed_at): (i64, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
        r#"
        INSERT INTO quiz_attempts
            (user_id, quiz_id, answers, score, percentage, time_spent,
             passed, streak, xp_earned, difficulty, category)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, completed_at
        "#,
    )
    .bind(user_id)
    .bind(quiz.id)
    .bind(sqlx::types::Json(&outcome.answers))
    .bind(outcome.score)
    .bind(outcome.percentage)
    .bind(req.time_spent)
    .bind(outcome.passed)
    .bind(streak_update.streak)
    .bind(outcome.xp_earned)
    .bind(&quiz.difficulty)
    .bind(&quiz.category)
    .fetch_one(&pool)
    .await?;

    // Steps 6-8: best-effort aggregate updates. The attempt stands even if
    // one of them fails.
    if let Err(e) = apply_learner_stats(&pool, &user, &quiz, &outcome, streak_update, today, now).await
    {
        tracing::error!(
            user_id,
            attempt_id,
            "Failed to update learner stats after attempt: {}",
            e
        );
    }

    let new_achievements = match check_achievements(
        &pool,
        user_id,
        &quiz,
        &outcome,
        streak_update.streak,
        req.time_spent,
    )
    .await
    {
        Ok(unlocked) => unlocked,
        Err(e) => {
            tracing::error!(
                user_id,
                attempt_id,
                "Failed to evaluate achievements after attempt: {}",
                e
            );
            Vec::new()
        }
    };

    if let Err(e) = refresh_quiz_stats(&pool, quiz.id).await {
        tracing::error!(
            quiz_id = quiz.id,
            attempt_id,
            "Failed to refresh quiz stats after attempt: {}",
            e
        );
    }

    // Step 9: snapshot for the caller. Achievement rewards may have pushed
    // the level further than the attempt alone.
    let stats = fetch_user(&pool, user_id).await?.stats;
    let level_up = stats.level > prev_level;

    Ok(Json(json!({
        "attempt_id": attempt_id,
        "score": outcome.score,
        "percentage": outcome.percentage,
        "passed": outcome.passed,
        "xp_earned": outcome.xp_earned,
        "streak": streak_update.streak,
        "feedback": outcome.feedback,
        "perfect": outcome.perfect,
        "fast": outcome.fast,
        "new_achievements": new_achievements,
        "time_spent": req.time_spent,
        "completed_at": completed_at,
        "learning_stats": stats,
        "level_up": level_up,
    })))
}

async fn fetch_quiz(pool: &PgPool, id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

async fn fetch_user(pool: &PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

async fn xp_earned_today(pool: &PgPool, user_id: i64) -> Result<i64, AppError> {
    let xp: i64 = sqlx::query_scalar(
        "SELECT CAST(COALESCE(SUM(xp_earned), 0) AS BIGINT) FROM quiz_attempts WHERE user_id = $1 AND completed_at >= CURRENT_DATE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(xp)
}

/// Step 6: applies the attempt's deltas to the learner profile.
///
/// Counters and XP go through atomic SQL increments so concurrent
/// submissions never lose an addition. The ring buffer and category map are
/// read-modify-write and accept last-writer-wins under true concurrency.
async fn apply_learner_stats(
    pool: &PgPool,
    user: &User,
    quiz: &Quiz,
    outcome: &ScoreOutcome,
    streak_update: StreakUpdate,
    today: NaiveDate,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users SET
            quizzes_completed = quizzes_completed + 1,
            total_xp = total_xp + $1,
            weekly_xp = weekly_xp + $1,
            monthly_xp = monthly_xp + $1,
            perfect_quizzes = perfect_quizzes + $2,
            streak = $3,
            longest_streak = GREATEST(longest_streak, $3),
            streak_freezes = GREATEST(streak_freezes - $4, 0),
            last_activity_date = $5
        WHERE id = $6
        "#,
    )
    .bind(outcome.xp_earned)
    .bind(if outcome.perfect { 1i64 } else { 0i64 })
    .bind(streak_update.streak)
    .bind(if streak_update.freeze_consumed { 1i64 } else { 0i64 })
    .bind(today)
    .bind(user.id)
    .execute(pool)
    .await?;

    // Ring buffer (last 10, newest first) and per-category XP map.
    let mut recent = user.stats.recent_quizzes.0.clone();
    recent.insert(
        0,
        RecentQuiz {
            quiz_id: quiz.id,
            score: outcome.percentage,
            category: quiz.category.clone(),
            completed_at: now,
        },
    );
    recent.truncate(RECENT_QUIZZES_KEPT);

    let mut category_progress = user.stats.category_progress.0.clone();
    *category_progress.entry(quiz.category.clone()).or_insert(0) += outcome.xp_earned;

    sqlx::query("UPDATE users SET recent_quizzes = $1, category_progress = $2 WHERE id = $3")
        .bind(sqlx::types::Json(&recent))
        .bind(sqlx::types::Json(&category_progress))
        .bind(user.id)
        .execute(pool)
        .await?;

    // Running average over all of the learner's attempts.
    sqlx::query(
        r#"
        UPDATE users SET average_quiz_score = COALESCE(
            (SELECT CAST(ROUND(AVG(percentage)) AS BIGINT)
             FROM quiz_attempts WHERE user_id = users.id), 0)
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .execute(pool)
    .await?;

    recompute_level(pool, user.id).await
}

/// Step 7: evaluates every active achievement against the attempt and the
/// updated stats, and grants each at most once.
///
/// The unique (user, achievement) constraint makes the grant idempotent:
/// the XP reward and badge are applied only when this request wins the
/// insert (or the completion upgrade of an in-progress record).
async fn check_achievements(
    pool: &PgPool,
    user_id: i64,
    quiz: &Quiz,
    outcome: &ScoreOutcome,
    streak: i64,
    time_spent: i64,
) -> Result<Vec<Achievement>, AppError> {
    let achievements =
        sqlx::query_as::<_, Achievement>("SELECT * FROM achievements WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    let existing =
        sqlx::query_as::<_, UserAchievement>("SELECT * FROM user_achievements WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    let user = fetch_user(pool, user_id).await?;
    let xp_today = xp_earned_today(pool, user_id).await?;

    let attempt_facts = AttemptFacts {
        percentage: outcome.percentage,
        streak,
        time_spent,
        passed: outcome.passed,
        category: quiz.category.clone(),
    };
    let stats_facts = StatsFacts {
        quizzes_completed: user.stats.quizzes_completed,
        level: user.stats.level,
        total_xp: user.stats.total_xp,
        weekly_xp: user.stats.weekly_xp,
        monthly_xp: user.stats.monthly_xp,
        xp_today,
        average_quiz_score: user.stats.average_quiz_score,
    };

    let mut newly_unlocked = Vec::new();

    for achievement in achievements {
        let existing_record = existing
            .iter()
            .find(|ua| ua.achievement_id == achievement.id);
        if existing_record.is_some_and(|ua| ua.is_completed) {
            continue;
        }

        let requirement = match achievement.requirement() {
            Ok(requirement) => requirement,
            Err(e) => {
                tracing::warn!("Skipping malformed achievement '{}': {}", achievement.name, e);
                continue;
            }
        };

        let Some(evaluation) = evaluate(
            &requirement,
            achievement.requirement_category.as_deref(),
            &attempt_facts,
            &stats_facts,
        ) else {
            continue;
        };
        if !evaluation.is_recordable() {
            continue;
        }

        let granted = if existing_record.is_some() {
            if evaluation.earned {
                // Upgrade in-progress to completed; the guard on
                // is_completed keeps concurrent submissions from granting
                // the reward twice.
                let result = sqlx::query(
                    r#"
                    UPDATE user_achievements
                    SET is_completed = TRUE, progress = 100, xp_earned = $1, unlocked_at = NOW()
                    WHERE user_id = $2 AND achievement_id = $3 AND is_completed = FALSE
                    "#,
                )
                .bind(achievement.xp_reward)
                .bind(user_id)
                .bind(achievement.id)
                .execute(pool)
                .await?;
                result.rows_affected() == 1
            } else {
                sqlx::query(
                    r#"
                    UPDATE user_achievements SET progress = GREATEST(progress, $1)
                    WHERE user_id = $2 AND achievement_id = $3 AND is_completed = FALSE
                    "#,
                )
                .bind(evaluation.progress)
                .bind(user_id)
                .bind(achievement.id)
                .execute(pool)
                .await?;
                false
            }
        } else {
            // First evaluation for this pair: exactly one row may win.
            let result = sqlx::query(
                r#"
                INSERT INTO user_achievements (user_id, achievement_id, progress, is_completed, xp_earned)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, achievement_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(achievement.id)
            .bind(evaluation.progress)
            .bind(evaluation.earned)
            .bind(if evaluation.earned { achievement.xp_reward } else { 0 })
            .execute(pool)
            .await?;
            evaluation.earned && result.rows_affected() == 1
        };

        if granted {
            grant_reward(pool, user_id, &achievement).await?;
            newly_unlocked.push(achievement);
        }
    }

    if !newly_unlocked.is_empty() {
        recompute_level(pool, user_id).await?;
    }

    Ok(newly_unlocked)
}

/// Applies a won achievement's XP reward and badge to the learner profile.
async fn grant_reward(pool: &PgPool, user_id: i64, achievement: &Achievement) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET total_xp = total_xp + $1 WHERE id = $2")
        .bind(achievement.xp_reward)
        .bind(user_id)
        .execute(pool)
        .await?;

    if let Some(badge) = &achievement.badge {
        sqlx::query("UPDATE users SET badges = badges || $1 WHERE id = $2")
            .bind(sqlx::types::Json(vec![badge.clone()]))
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Recomputes level and xp-to-next from the current XP total. The stored
/// level never decreases.
async fn recompute_level(pool: &PgPool, user_id: i64) -> Result<(), AppError> {
    let (total_xp, level): (i64, i64) =
        sqlx::query_as("SELECT total_xp, level FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    let state = leveling::recompute(level, total_xp);

    sqlx::query(
        "UPDATE users SET level = GREATEST(level, $1), xp_to_next_level = $2 WHERE id = $3",
    )
    .bind(state.level)
    .bind(state.xp_to_next_level)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Step 8: recomputes the quiz's rolling stats over all of its attempts.
async fn refresh_quiz_stats(pool: &PgPool, quiz_id: i64) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE quizzes SET
            total_attempts = s.cnt,
            average_score = COALESCE(s.avg_score, 0),
            completion_rate = COALESCE(s.rate, 0)
        FROM (
            SELECT
                COUNT(*) AS cnt,
                CAST(ROUND(AVG(percentage)) AS BIGINT) AS avg_score,
                CAST(ROUND(100.0 * COUNT(*) FILTER (WHERE passed) / NULLIF(COUNT(*), 0)) AS BIGINT) AS rate
            FROM quiz_attempts
            WHERE quiz_id = $1
        ) s
        WHERE quizzes.id = $1
        "#,
    )
    .bind(quiz_id)
    .execute(pool)
    .await?;

    Ok(())
}
