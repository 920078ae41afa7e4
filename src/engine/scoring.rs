// src/engine/scoring.rs

use crate::error::AppError;
use crate::models::attempt::{AttemptAnswer, SubmittedAnswer};
use crate::models::quiz::Quiz;

/// XP bonus for a 100% score.
pub const PERFECT_BONUS_XP: i64 = 50;

/// XP bonus for finishing within half the allotted time.
pub const SPEED_BONUS_XP: i64 = 20;

/// Result of grading one submission against a quiz.
#[derive(Debug)]
pub struct ScoreOutcome {
    /// Per-question grading results, one per question in order.
    pub answers: Vec<AttemptAnswer>,
    pub score: i64,
    pub total_points: i64,
    pub percentage: i64,
    pub passed: bool,
    pub perfect: bool,
    pub fast: bool,
    pub xp_earned: i64,
    pub feedback: &'static str,
}

/// Grades a submission. Answers are positional: the list must carry exactly
/// one entry per quiz question, in question order.
///
/// Correctness is an exact string match against the question's canonical
/// answer; a correct answer earns the question's full point value, an
/// incorrect one earns zero.
pub fn grade(
    quiz: &Quiz,
    answers: &[SubmittedAnswer],
    time_spent: i64,
) -> Result<ScoreOutcome, AppError> {
    let questions = &quiz.questions.0;

    if questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }
    if answers.len() != questions.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let mut score = 0;
    let mut total_points = 0;
    let mut graded = Vec::with_capacity(answers.len());

    for (question, answer) in questions.iter().zip(answers) {
        let is_correct = answer.selected_answer == question.correct_answer;
        let points_earned = if is_correct { question.points } else { 0 };

        score += points_earned;
        total_points += question.points;

        graded.push(AttemptAnswer {
            question_id: question.id,
            selected_answer: answer.selected_answer.clone(),
            is_correct,
            time_spent: answer.time_spent,
            points_earned,
        });
    }

    // Integer percentage, rounded half-up.
    let percentage = ((score * 100) as f64 / total_points as f64).round() as i64;

    let perfect = percentage == 100;
    // Half the limit: time_limit is minutes, so *60 seconds / 2 = *30.
    let fast = time_spent < quiz.time_limit * 30;

    let mut xp_earned = score; // Base XP = raw score
    if perfect {
        xp_earned += PERFECT_BONUS_XP;
    }
    if fast {
        xp_earned += SPEED_BONUS_XP;
    }

    Ok(ScoreOutcome {
        answers: graded,
        score,
        total_points,
        percentage,
        passed: percentage >= quiz.passing_score,
        perfect,
        fast,
        xp_earned,
        feedback: feedback_for(percentage, time_spent, quiz.time_limit),
    })
}

/// Picks the feedback tier from the percentage and the time ratio.
/// The wording is presentation; the thresholds are the contract.
fn feedback_for(percentage: i64, time_spent: i64, time_limit_minutes: i64) -> &'static str {
    let time_ratio = time_spent as f64 / (time_limit_minutes * 60) as f64;

    if percentage >= 90 {
        if time_ratio < 0.5 {
            "Excellent! Great score and lightning fast! 🚀"
        } else {
            "Excellent work! Great accuracy! 🎯"
        }
    } else if percentage >= 80 {
        "Great job! You're doing really well! 👍"
    } else if percentage >= 70 {
        "Good effort! Keep practicing to improve! 💪"
    } else {
        "Don't give up! Practice makes perfect! 🌟"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{Question, QuestionOption};
    use sqlx::types::Json;

    fn option(text: &str, is_correct: bool) -> QuestionOption {
        QuestionOption {
            text: text.to_string(),
            is_correct,
        }
    }

    fn question(id: i64, correct: &str, points: i64) -> Question {
        Question {
            id,
            question: format!("Question {}", id),
            question_type: "multiple-choice".to_string(),
            options: vec![option(correct, true), option("Wrong", false)],
            correct_answer: correct.to_string(),
            explanation: None,
            points,
            category: None,
        }
    }

    fn quiz(num_questions: i64, points_each: i64, passing: i64, time_limit: i64) -> Quiz {
        Quiz {
            id: 1,
            title: "Test quiz".to_string(),
            description: None,
            category: "alphabet".to_string(),
            difficulty: "Beginner".to_string(),
            questions: Json(
                (1..=num_questions)
                    .map(|i| question(i, "A", points_each))
                    .collect(),
            ),
            time_limit,
            passing_score: passing,
            max_attempts: 3,
            is_active: true,
            tags: Json(vec![]),
            total_attempts: 0,
            average_score: 0,
            completion_rate: 0,
            created_by: None,
            created_at: None,
        }
    }

    fn answers(selected: &[&str]) -> Vec<SubmittedAnswer> {
        selected
            .iter()
            .map(|s| SubmittedAnswer {
                selected_answer: s.to_string(),
                time_spent: 0,
            })
            .collect()
    }

    #[test]
    fn four_of_five_passes_with_speed_bonus() {
        // 5 questions x 10 points, passing 70, limit 5 minutes.
        let quiz = quiz(5, 10, 70, 5);
        let outcome = grade(&quiz, &answers(&["A", "A", "A", "A", "B"]), 120).unwrap();

        assert_eq!(outcome.score, 40);
        assert_eq!(outcome.percentage, 80);
        assert!(outcome.passed);
        assert!(!outcome.perfect);
        assert!(outcome.fast); // 120 < 150
        assert_eq!(outcome.xp_earned, 60); // 40 + speed bonus
    }

    #[test]
    fn perfect_fast_run_stacks_both_bonuses() {
        let quiz = quiz(5, 10, 70, 5);
        let outcome = grade(&quiz, &answers(&["A"; 5]), 100).unwrap();

        assert_eq!(outcome.percentage, 100);
        assert!(outcome.perfect);
        assert!(outcome.fast);
        assert_eq!(outcome.xp_earned, 50 + 50 + 20);
    }

    #[test]
    fn zero_correct_scores_zero() {
        let quiz = quiz(5, 10, 70, 5);
        let outcome = grade(&quiz, &answers(&["B"; 5]), 280).unwrap();

        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.percentage, 0);
        assert!(!outcome.passed);
        assert_eq!(outcome.xp_earned, 0);
    }

    #[test]
    fn percentage_rounds_half_up() {
        // 1 of 3 correct at 10 points each: 33.33 -> 33; 2 of 3: 66.67 -> 67.
        let quiz = quiz(3, 10, 70, 5);
        let one = grade(&quiz, &answers(&["A", "B", "B"]), 280).unwrap();
        assert_eq!(one.percentage, 33);
        let two = grade(&quiz, &answers(&["A", "A", "B"]), 280).unwrap();
        assert_eq!(two.percentage, 67);
    }

    #[test]
    fn pass_boundary_is_inclusive() {
        let quiz = quiz(5, 10, 80, 5);
        let outcome = grade(&quiz, &answers(&["A", "A", "A", "A", "B"]), 280).unwrap();
        assert_eq!(outcome.percentage, 80);
        assert!(outcome.passed);
    }

    #[test]
    fn slow_finish_gets_no_speed_bonus() {
        let quiz = quiz(5, 10, 70, 5);
        // Exactly half the limit is not "fast".
        let outcome = grade(&quiz, &answers(&["A"; 5]), 150).unwrap();
        assert!(!outcome.fast);
        assert_eq!(outcome.xp_earned, 50 + 50);
    }

    #[test]
    fn mismatched_answer_count_is_rejected() {
        let quiz = quiz(5, 10, 70, 5);
        assert!(grade(&quiz, &answers(&["A", "A"]), 60).is_err());
    }

    #[test]
    fn feedback_tier_thresholds() {
        // >= 90 and under half the limit.
        assert!(feedback_for(95, 100, 5).contains("lightning"));
        // >= 90 but slow.
        assert!(feedback_for(95, 200, 5).contains("accuracy"));
        assert!(feedback_for(85, 200, 5).contains("Great job"));
        assert!(feedback_for(72, 200, 5).contains("Good effort"));
        assert!(feedback_for(40, 200, 5).contains("Practice makes perfect"));
    }
}
