//! Spaced-repetition bookkeeping for the mistake bank.
//!
//! Everything here works on a plain [`ReviewState`] value; persisting the
//! result is the caller's job.

use std::cmp::Ordering;

use thiserror::Error;
use time::PrimitiveDateTime;

use crate::core::time::add_days;
use crate::db::models::MistakeRecord;

/// Days until the next review, indexed by the consecutive-correct streak.
pub(crate) const INTERVAL_DAYS: [i64; 8] = [1, 2, 4, 7, 15, 30, 60, 90];
pub(crate) const MIN_MASTERY: i32 = 1;
pub(crate) const MAX_MASTERY: i32 = 5;
pub(crate) const MIN_IMPORTANCE: i32 = 1;
pub(crate) const MAX_IMPORTANCE: i32 = 5;
pub(crate) const DEFAULT_IMPORTANCE: i32 = 3;
const STREAK_PER_LEVEL: i32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ReviewError {
    #[error("importance must be between {MIN_IMPORTANCE} and {MAX_IMPORTANCE}, got {0}")]
    InvalidImportance(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReviewOutcome {
    Correct,
    Incorrect,
}

impl ReviewOutcome {
    pub(crate) fn from_correct(correct: bool) -> Self {
        if correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReviewState {
    pub(crate) importance: i32,
    pub(crate) mastery_level: i32,
    pub(crate) consecutive_correct: i32,
    pub(crate) wrong_count: i32,
    pub(crate) review_count: i32,
    pub(crate) correct_count: i32,
    pub(crate) next_review_at: PrimitiveDateTime,
    pub(crate) last_reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) last_wrong_at: PrimitiveDateTime,
    pub(crate) is_archived: bool,
    pub(crate) archived_at: Option<PrimitiveDateTime>,
}

impl ReviewState {
    /// State of a freshly recorded mistake: due immediately at the lowest mastery.
    pub(crate) fn new_mistake(importance: i32, now: PrimitiveDateTime) -> Self {
        Self {
            importance: importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE),
            mastery_level: MIN_MASTERY,
            consecutive_correct: 0,
            wrong_count: 1,
            review_count: 0,
            correct_count: 0,
            next_review_at: now,
            last_reviewed_at: None,
            last_wrong_at: now,
            is_archived: false,
            archived_at: None,
        }
    }

    pub(crate) fn from_record(record: &MistakeRecord) -> Self {
        Self {
            importance: record.importance,
            mastery_level: record.mastery_level,
            consecutive_correct: record.consecutive_correct,
            wrong_count: record.wrong_count,
            review_count: record.review_count,
            correct_count: record.correct_count,
            next_review_at: record.next_review_at,
            last_reviewed_at: record.last_reviewed_at,
            last_wrong_at: record.last_wrong_at,
            is_archived: record.is_archived,
            archived_at: record.archived_at,
        }
    }

    /// Share of wrong answers among all answers to this question, in percent.
    pub(crate) fn error_rate(&self) -> f64 {
        let attempts = self.wrong_count + self.correct_count;
        if attempts <= 0 {
            return 0.0;
        }
        f64::from(self.wrong_count) * 100.0 / f64::from(attempts)
    }

    pub(crate) fn is_due(&self, now: PrimitiveDateTime) -> bool {
        !self.is_archived && self.next_review_at <= now
    }
}

pub(crate) fn validate_importance(importance: i32) -> Result<i32, ReviewError> {
    if (MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&importance) {
        Ok(importance)
    } else {
        Err(ReviewError::InvalidImportance(importance))
    }
}

pub(crate) fn interval_days(consecutive_correct: i32) -> i64 {
    let index = (consecutive_correct - 1).max(0) as usize;
    INTERVAL_DAYS[index.min(INTERVAL_DAYS.len() - 1)]
}

pub(crate) fn record_review(
    state: &mut ReviewState,
    outcome: ReviewOutcome,
    now: PrimitiveDateTime,
) {
    state.review_count += 1;
    state.last_reviewed_at = Some(now);

    match outcome {
        ReviewOutcome::Correct => {
            state.correct_count += 1;
            state.consecutive_correct += 1;
            if state.consecutive_correct >= STREAK_PER_LEVEL {
                state.mastery_level = (state.mastery_level + 1).min(MAX_MASTERY);
                state.consecutive_correct = 0;
            }
            state.next_review_at = add_days(now, interval_days(state.consecutive_correct));

            if state.mastery_level >= MAX_MASTERY && !state.is_archived {
                state.is_archived = true;
                state.archived_at = Some(now);
            }
        }
        ReviewOutcome::Incorrect => mark_wrong(state, now),
    }
}

/// A question already in the bank was answered wrongly again outside a review.
pub(crate) fn register_repeat_mistake(state: &mut ReviewState, now: PrimitiveDateTime) {
    mark_wrong(state, now);
}

fn mark_wrong(state: &mut ReviewState, now: PrimitiveDateTime) {
    state.wrong_count += 1;
    state.consecutive_correct = 0;
    state.next_review_at = now;
    state.last_wrong_at = now;
    state.mastery_level = (state.mastery_level - 1).max(MIN_MASTERY);
    if state.mastery_level < MAX_MASTERY {
        state.is_archived = false;
        state.archived_at = None;
    }
}

pub(crate) fn priority_score(state: &ReviewState, now: PrimitiveDateTime) -> f64 {
    let overdue_bonus = if state.next_review_at <= now { 50.0 } else { 0.0 };
    f64::from(state.importance) * 20.0
        + f64::from(6 - state.mastery_level) * 15.0
        + overdue_bonus
        + state.error_rate() * 0.5
}

#[derive(Debug, Clone)]
pub(crate) struct Ranked<T> {
    pub(crate) item: T,
    pub(crate) score: f64,
}

/// Picks the `limit` highest-priority active records for a review session.
pub(crate) fn select_for_session<T, F>(
    candidates: Vec<T>,
    now: PrimitiveDateTime,
    limit: usize,
    state_of: F,
) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> ReviewState,
{
    let mut ranked = candidates
        .into_iter()
        .filter_map(|item| {
            let state = state_of(&item);
            if state.is_archived {
                return None;
            }
            let score = priority_score(&state, now);
            Some((Ranked { item, score }, state.next_review_at))
        })
        .collect::<Vec<_>>();

    ranked.sort_by(|(left, left_due), (right, right_due)| {
        right
            .score
            .partial_cmp(&left.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left_due.cmp(right_due))
    });
    ranked.truncate(limit);
    ranked.into_iter().map(|(ranked, _)| ranked).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: PrimitiveDateTime = datetime!(2025-03-10 12:00);

    fn state(mastery_level: i32, consecutive_correct: i32) -> ReviewState {
        ReviewState {
            mastery_level,
            consecutive_correct,
            ..ReviewState::new_mistake(DEFAULT_IMPORTANCE, datetime!(2025-03-01 09:00))
        }
    }

    #[test]
    fn third_correct_answer_levels_up_and_resets_streak() {
        let mut current = state(1, 2);
        record_review(&mut current, ReviewOutcome::Correct, NOW);

        assert_eq!(current.mastery_level, 2);
        assert_eq!(current.consecutive_correct, 0);
        assert_eq!(current.next_review_at, datetime!(2025-03-11 12:00));
        assert!(!current.is_archived);
    }

    #[test]
    fn streak_indexes_interval_table() {
        let mut current = state(1, 0);
        record_review(&mut current, ReviewOutcome::Correct, NOW);
        assert_eq!(current.consecutive_correct, 1);
        assert_eq!(current.next_review_at, add_days(NOW, 1));

        record_review(&mut current, ReviewOutcome::Correct, NOW);
        assert_eq!(current.consecutive_correct, 2);
        assert_eq!(current.next_review_at, add_days(NOW, 2));
    }

    #[test]
    fn interval_lookup_is_clamped() {
        assert_eq!(interval_days(0), 1);
        assert_eq!(interval_days(1), 1);
        assert_eq!(interval_days(3), 4);
        assert_eq!(interval_days(8), 90);
        assert_eq!(interval_days(40), 90);
    }

    #[test]
    fn mastery_grows_by_one_per_three_correct_and_archives_at_five() {
        for rounds in 1..=6 {
            let mut current = state(1, 0);
            for _ in 0..rounds * 3 {
                record_review(&mut current, ReviewOutcome::Correct, NOW);
            }
            let expected = (1 + rounds).min(MAX_MASTERY);
            assert_eq!(current.mastery_level, expected, "after {} correct answers", rounds * 3);
            assert_eq!(current.is_archived, expected == MAX_MASTERY);
        }
    }

    #[test]
    fn archive_timestamp_is_set_once() {
        let mut current = state(4, 2);
        record_review(&mut current, ReviewOutcome::Correct, NOW);
        assert!(current.is_archived);
        assert_eq!(current.archived_at, Some(NOW));

        let later = datetime!(2025-04-01 08:00);
        record_review(&mut current, ReviewOutcome::Correct, later);
        assert_eq!(current.archived_at, Some(NOW));
        assert_eq!(current.mastery_level, MAX_MASTERY);
    }

    #[test]
    fn incorrect_answer_resets_streak_and_is_due_now() {
        let mut current = state(3, 2);
        current.next_review_at = datetime!(2025-03-20 00:00);
        record_review(&mut current, ReviewOutcome::Incorrect, NOW);

        assert_eq!(current.consecutive_correct, 0);
        assert_eq!(current.next_review_at, NOW);
        assert_eq!(current.last_wrong_at, NOW);
        assert_eq!(current.mastery_level, 2);
        assert_eq!(current.wrong_count, 2);
        assert_eq!(current.review_count, 1);
    }

    #[test]
    fn mastery_never_drops_below_one() {
        let mut current = state(1, 1);
        record_review(&mut current, ReviewOutcome::Incorrect, NOW);
        record_review(&mut current, ReviewOutcome::Incorrect, NOW);
        assert_eq!(current.mastery_level, MIN_MASTERY);
    }

    #[test]
    fn wrong_answer_unarchives() {
        let mut current = state(4, 2);
        record_review(&mut current, ReviewOutcome::Correct, NOW);
        assert!(current.is_archived);

        register_repeat_mistake(&mut current, NOW);
        assert!(!current.is_archived);
        assert_eq!(current.archived_at, None);
        assert_eq!(current.mastery_level, 4);
        assert_eq!(current.review_count, 1);
    }

    #[test]
    fn error_rate_counts_wrong_over_all_answers() {
        let mut current = state(1, 0);
        assert_eq!(current.error_rate(), 100.0);
        current.correct_count = 3;
        assert_eq!(current.error_rate(), 25.0);
    }

    #[test]
    fn priority_score_matches_weights() {
        let mut current = state(2, 0);
        current.importance = 4;
        current.wrong_count = 1;
        current.correct_count = 1;
        current.next_review_at = datetime!(2025-03-09 00:00);

        // 4*20 + (6-2)*15 + 50 + 50*0.5
        assert_eq!(priority_score(&current, NOW), 215.0);

        current.next_review_at = datetime!(2025-03-12 00:00);
        assert_eq!(priority_score(&current, NOW), 165.0);
    }

    #[test]
    fn session_excludes_archived_and_orders_by_score() {
        let mut high = state(1, 0);
        high.importance = 5;
        let mut low = state(4, 0);
        low.importance = 1;
        low.next_review_at = datetime!(2025-04-01 00:00);
        let mut archived = state(5, 0);
        archived.is_archived = true;
        archived.importance = 5;
        let middle = state(2, 0);

        let candidates =
            vec![("low", low), ("archived", archived), ("high", high), ("mid", middle)];
        let picked = select_for_session(candidates, NOW, 2, |(_, state)| state.clone());

        let names = picked.iter().map(|ranked| ranked.item.0).collect::<Vec<_>>();
        assert_eq!(names, vec!["high", "mid"]);
        assert!(picked[0].score > picked[1].score);
    }

    #[test]
    fn session_ties_prefer_earlier_due_date() {
        let mut earlier = state(2, 0);
        earlier.next_review_at = datetime!(2025-03-01 00:00);
        let mut later = state(2, 0);
        later.next_review_at = datetime!(2025-03-05 00:00);

        let picked =
            select_for_session(vec![("later", later), ("earlier", earlier)], NOW, 10, |(_, s)| {
                s.clone()
            });
        assert_eq!(picked[0].item.0, "earlier");
    }

    #[test]
    fn importance_validation() {
        assert_eq!(validate_importance(3), Ok(3));
        assert_eq!(validate_importance(0), Err(ReviewError::InvalidImportance(0)));
        assert_eq!(validate_importance(6), Err(ReviewError::InvalidImportance(6)));
    }
}
