// src/engine/selector.rs

use rand::Rng;
use rand::seq::SliceRandom;

use crate::models::quiz::Question;
use crate::models::user::RecentQuiz;

/// Inclusion probability for a question in one of the learner's weak areas.
const WEAK_AREA_P: f64 = 0.8;
/// Inclusion probability for a question in one of the learner's strong areas.
const STRONG_AREA_P: f64 = 0.3;
/// Inclusion probability for everything else.
const NEUTRAL_P: f64 = 0.6;

/// Picks the question order to present for one attempt.
///
/// With no attempt history the full list is returned shuffled. Otherwise
/// each question gets an independent Bernoulli draw biased by the learner's
/// weak/strong areas, and the unselected remainder is backfilled in random
/// order. The result always contains every question exactly once; only the
/// ordering is adaptive.
pub fn select_questions<R: Rng + ?Sized>(
    questions: &[Question],
    quiz_category: &str,
    recent: &[RecentQuiz],
    weak_areas: &[String],
    strong_areas: &[String],
    rng: &mut R,
) -> Vec<Question> {
    let mut selected: Vec<Question>;

    if recent.is_empty() {
        selected = questions.to_vec();
        selected.shuffle(rng);
        return selected;
    }

    selected = Vec::with_capacity(questions.len());
    let mut remainder = Vec::new();

    for question in questions {
        let area = question.category.as_deref().unwrap_or(quiz_category);
        let p = if weak_areas.iter().any(|a| a == area) {
            WEAK_AREA_P
        } else if strong_areas.iter().any(|a| a == area) {
            STRONG_AREA_P
        } else {
            NEUTRAL_P
        };

        if rng.random_bool(p) {
            selected.push(question.clone());
        } else {
            remainder.push(question.clone());
        }
    }

    // Backfill so the attempt always carries the quiz's full question count.
    remainder.shuffle(rng);
    selected.extend(remainder);

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn question(id: i64, category: Option<&str>) -> Question {
        Question {
            id,
            question: format!("Q{}", id),
            question_type: "multiple-choice".to_string(),
            options: vec![],
            correct_answer: "A".to_string(),
            explanation: None,
            points: 10,
            category: category.map(str::to_string),
        }
    }

    fn history() -> Vec<RecentQuiz> {
        vec![RecentQuiz {
            quiz_id: 1,
            score: 80,
            category: "alphabet".to_string(),
            completed_at: Utc::now(),
        }]
    }

    fn ids(questions: &[Question]) -> HashSet<i64> {
        questions.iter().map(|q| q.id).collect()
    }

    #[test]
    fn no_history_returns_all_questions() {
        let questions: Vec<_> = (1..=8).map(|i| question(i, None)).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let selected = select_questions(&questions, "mixed", &[], &[], &[], &mut rng);

        assert_eq!(selected.len(), questions.len());
        assert_eq!(ids(&selected), ids(&questions));
    }

    #[test]
    fn always_full_count_and_no_duplicates() {
        let questions: Vec<_> = (1..=20)
            .map(|i| {
                question(
                    i,
                    Some(match i % 3 {
                        0 => "alphabet",
                        1 => "phrases",
                        _ => "family",
                    }),
                )
            })
            .collect();
        let weak = vec!["alphabet".to_string()];
        let strong = vec!["phrases".to_string()];

        // Any seed must preserve cardinality and uniqueness.
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selected =
                select_questions(&questions, "mixed", &history(), &weak, &strong, &mut rng);
            assert_eq!(selected.len(), questions.len());
            assert_eq!(ids(&selected).len(), questions.len());
        }
    }

    #[test]
    fn weak_areas_lead_the_ordering_on_average() {
        let questions: Vec<_> = (1..=10)
            .map(|i| question(i, Some(if i <= 5 { "alphabet" } else { "phrases" })))
            .collect();
        let weak = vec!["alphabet".to_string()];
        let strong = vec!["phrases".to_string()];

        // Weak-area questions (0.8) should reach the front half far more
        // often than strong-area ones (0.3).
        let mut weak_front = 0;
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let selected =
                select_questions(&questions, "mixed", &history(), &weak, &strong, &mut rng);
            weak_front += selected[..5].iter().filter(|q| q.id <= 5).count();
        }
        assert!(weak_front > 500, "weak-area front count: {}", weak_front);
    }

    #[test]
    fn question_without_category_falls_back_to_quiz_category() {
        let questions: Vec<_> = (1..=6).map(|i| question(i, None)).collect();
        let weak = vec!["mixed".to_string()];
        let mut rng = StdRng::seed_from_u64(3);

        let selected = select_questions(&questions, "mixed", &history(), &weak, &[], &mut rng);
        assert_eq!(selected.len(), 6);
    }
}
