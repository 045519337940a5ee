use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::db::models::{BucketStats, ExamAnalysis, ExamResponse, Question};
use crate::db::types::{ExamGrade, QuestionType};

pub(crate) struct AnsweredQuestion<'a> {
    pub(crate) question: &'a Question,
    pub(crate) answer: Value,
    pub(crate) time_spent_seconds: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct GradedExam {
    pub(crate) responses: Vec<ExamResponse>,
    pub(crate) correct_count: u32,
    pub(crate) score: f64,
    pub(crate) grade: ExamGrade,
    pub(crate) analysis: ExamAnalysis,
}

impl GradedExam {
    pub(crate) fn wrong_question_ids(&self) -> impl Iterator<Item = &str> {
        self.responses
            .iter()
            .filter(|response| response.is_correct == Some(false))
            .map(|response| response.question_id.as_str())
    }
}

/// Whether `given` matches the canonical answer. `None` for essays, which
/// need a human.
pub(crate) fn check_answer(kind: QuestionType, correct: &Value, given: &Value) -> Option<bool> {
    match kind {
        QuestionType::Essay => None,
        QuestionType::Single => Some(match (single_key(correct), single_key(given)) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        }),
        QuestionType::Multiple => {
            let expected = key_set(correct);
            Some(!expected.is_empty() && expected == key_set(given))
        }
        QuestionType::Judge => Some(match (truth_value(correct), truth_value(given)) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        }),
        QuestionType::Fill => Some(check_fill(correct, given)),
    }
}

fn single_key(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_ascii_uppercase()),
        Value::Array(items) if items.len() == 1 => single_key(&items[0]),
        _ => None,
    }
}

/// `["A", "C"]` and `"AC"` both describe the option set {A, C}.
fn key_set(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(single_key).collect(),
        Value::String(text) => text
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .flat_map(|part| {
                if part.chars().all(|ch| ch.is_ascii_alphabetic()) {
                    part.chars().map(|ch| ch.to_ascii_uppercase().to_string()).collect::<Vec<_>>()
                } else {
                    vec![part.to_ascii_uppercase()]
                }
            })
            .filter(|key| !key.is_empty())
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn truth_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" | "correct" => Some(true),
            "false" | "f" | "no" | "0" | "incorrect" => Some(false),
            _ => None,
        },
        Value::Number(number) => number.as_i64().map(|value| value != 0),
        _ => None,
    }
}

fn normalize_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_lowercase()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Canonical fill answers are either one string, a list of accepted
/// alternatives, or (when the user submits a list) one answer per blank.
fn check_fill(correct: &Value, given: &Value) -> bool {
    match (correct, given) {
        (Value::Array(expected), Value::Array(actual)) if expected.len() == actual.len() => {
            expected.iter().zip(actual).all(|(expected, actual)| check_fill(expected, actual))
        }
        (Value::Array(accepted), _) => accepted.iter().any(|option| check_fill(option, given)),
        _ => match (normalize_text(correct), normalize_text(given)) {
            (Some(expected), Some(actual)) => !actual.is_empty() && expected == actual,
            _ => false,
        },
    }
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage of correct answers among auto-gradable ones, one decimal.
pub(crate) fn score_percent(correct: u32, gradable: u32) -> f64 {
    if gradable == 0 {
        return 0.0;
    }
    round_one_decimal(f64::from(correct) * 100.0 / f64::from(gradable))
}

fn tally(buckets: &mut BTreeMap<String, BucketStats>, key: &str, correct: bool) {
    let bucket = buckets.entry(key.to_string()).or_default();
    bucket.total += 1;
    if correct {
        bucket.correct += 1;
    }
    bucket.accuracy = score_percent(bucket.correct, bucket.total);
}

pub(crate) fn grade_exam(items: Vec<AnsweredQuestion<'_>>) -> GradedExam {
    let mut responses = Vec::with_capacity(items.len());
    let mut analysis = ExamAnalysis::default();
    let mut correct_count = 0;
    let mut gradable = 0;

    for item in items {
        let question = item.question;
        let is_correct = check_answer(question.question_type, &question.answer.0, &item.answer);

        match is_correct {
            Some(correct) => {
                gradable += 1;
                if correct {
                    correct_count += 1;
                }
                tally(&mut analysis.by_type, question.question_type.as_str(), correct);
                tally(&mut analysis.by_difficulty, question.difficulty.as_str(), correct);
            }
            None => analysis.ungraded += 1,
        }

        responses.push(ExamResponse {
            question_id: question.id.clone(),
            question_type: question.question_type,
            difficulty: question.difficulty,
            user_answer: item.answer,
            correct_answer: question.answer.0.clone(),
            is_correct,
            time_spent_seconds: item.time_spent_seconds,
        });
    }

    let score = score_percent(correct_count, gradable);
    GradedExam { responses, correct_count, score, grade: ExamGrade::from_score(score), analysis }
}
