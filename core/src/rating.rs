use serde::{Deserialize, Serialize};

/// Signed weights applied to activity counts. Ratings are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingWeights {
    pub like: i64,
    pub dislike: i64,
    /// Applied per answer posted on a question (and per answer authored, for profiles).
    pub comment: i64,
    pub correct: i64,
    pub question: i64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self { like: 1, dislike: -1, comment: 3, correct: 5, question: 2 }
    }
}

/// `weight * count`, saturating at the `i64` bounds instead of wrapping.
fn term(weight: i64, count: u64) -> i64 {
    weight.saturating_mul(i64::try_from(count).unwrap_or(i64::MAX))
}

pub fn question_rating(w: &RatingWeights, likes: u64, dislikes: u64, answer_count: u64) -> i64 {
    term(w.like, likes)
        .saturating_add(term(w.dislike, dislikes))
        .saturating_add(term(w.comment, answer_count))
}

pub fn answer_rating(w: &RatingWeights, likes: u64, dislikes: u64, is_correct: bool) -> i64 {
    let bonus = if is_correct { w.correct } else { 0 };
    term(w.like, likes).saturating_add(term(w.dislike, dislikes)).saturating_add(bonus)
}

pub fn profile_rating(w: &RatingWeights, questions: u64, answers: u64, correct_answers: u64) -> i64 {
    term(w.question, questions)
        .saturating_add(term(w.comment, answers))
        .saturating_add(term(w.correct, correct_answers))
}
