use std::collections::HashSet;

use serde_json::Value;
use time::PrimitiveDateTime;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption, QuestionRevision, User};
use crate::db::types::{ApprovalStatus, DifficultyLevel, QuestionType};

/// Older revisions beyond this are dropped from the stored history.
pub(crate) const MAX_REVISIONS: usize = 20;

/// Checks that options and answer fit the question type.
pub(crate) fn validate_question_shape(
    kind: QuestionType,
    options: &[QuestionOption],
    answer: &Value,
) -> Result<(), String> {
    if kind.has_options() {
        if options.len() < 2 {
            return Err("Choice questions need at least two options".to_string());
        }
        let mut keys = HashSet::new();
        for option in options {
            let key = option.key.trim().to_ascii_uppercase();
            if key.is_empty() || option.text.trim().is_empty() {
                return Err("Option key and text must not be empty".to_string());
            }
            if !keys.insert(key) {
                return Err(format!("Duplicate option key '{}'", option.key));
            }
        }

        let answer_keys = answer_keys(answer);
        if answer_keys.is_empty() {
            return Err("Answer must reference at least one option".to_string());
        }
        if let Some(missing) = answer_keys.iter().find(|key| !keys.contains(*key)) {
            return Err(format!("Answer references unknown option '{missing}'"));
        }
        if kind == QuestionType::Single && answer_keys.len() != 1 {
            return Err("Single choice questions have exactly one answer".to_string());
        }
        return Ok(());
    }

    match kind {
        QuestionType::Judge => match answer {
            Value::Bool(_) => Ok(()),
            Value::String(text) if matches!(text.trim(), "true" | "false") => Ok(()),
            _ => Err("Judge answers must be true or false".to_string()),
        },
        QuestionType::Fill => {
            let filled = match answer {
                Value::String(text) => !text.trim().is_empty(),
                Value::Array(items) => {
                    !items.is_empty()
                        && items
                            .iter()
                            .all(|item| item.as_str().is_some_and(|text| !text.trim().is_empty()))
                }
                _ => false,
            };
            if filled {
                Ok(())
            } else {
                Err("Fill answers must be a non-empty string or list of strings".to_string())
            }
        }
        _ => Ok(()),
    }
}

fn answer_keys(answer: &Value) -> Vec<String> {
    match answer {
        Value::String(text) => text
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|part| !part.is_empty())
            .flat_map(|part| {
                if part.len() > 1 && part.chars().all(|ch| ch.is_ascii_alphabetic()) {
                    part.chars().map(|ch| ch.to_string()).collect::<Vec<_>>()
                } else {
                    vec![part.to_string()]
                }
            })
            .map(|key| key.to_ascii_uppercase())
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|key| key.trim().to_ascii_uppercase())
            .filter(|key| !key.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Approval state for a question when it is created by `author`.
pub(crate) fn initial_approval(is_public: bool, author: &User) -> ApprovalStatus {
    if !is_public || author.is_admin() {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct QuestionEdit {
    pub(crate) content: Option<String>,
    pub(crate) question_type: Option<QuestionType>,
    pub(crate) options: Option<Vec<QuestionOption>>,
    pub(crate) answer: Option<Value>,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) tags: Option<Vec<String>>,
    pub(crate) category: Option<String>,
    pub(crate) is_public: Option<bool>,
}

/// Applies `edit` in place. When the graded part of the question changes,
/// the previous state is pushed to history and the version goes up.
/// A non-admin edit of a public question sends it back to moderation.
pub(crate) fn apply_edit(
    question: &mut Question,
    edit: QuestionEdit,
    editor: &User,
    now: PrimitiveDateTime,
) -> Result<(), String> {
    let previous = QuestionRevision {
        version: question.version,
        content: question.content.clone(),
        options: question.options.0.clone(),
        answer: question.answer.0.clone(),
        explanation: question.explanation.clone(),
        difficulty: question.difficulty,
        edited_by: editor.id.clone(),
        edited_at: format_primitive(now),
    };
    let before = (
        question.content.clone(),
        question.question_type,
        question.options.0.clone(),
        question.answer.0.clone(),
        question.explanation.clone(),
        question.difficulty,
    );

    if let Some(content) = edit.content {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err("Question content must not be empty".to_string());
        }
        question.content = content;
    }
    if let Some(kind) = edit.question_type {
        question.question_type = kind;
    }
    if let Some(options) = edit.options {
        question.options.0 = options;
    }
    if let Some(answer) = edit.answer {
        question.answer.0 = answer;
    }
    if let Some(explanation) = edit.explanation {
        question.explanation = Some(explanation).filter(|text| !text.trim().is_empty());
    }
    if let Some(difficulty) = edit.difficulty {
        question.difficulty = difficulty;
    }
    if let Some(tags) = edit.tags {
        question.tags.0 = normalize_tags(tags);
    }
    if let Some(category) = edit.category {
        question.category = Some(category).filter(|text| !text.trim().is_empty());
    }
    let became_public = edit.is_public == Some(true) && !question.is_public;
    if let Some(is_public) = edit.is_public {
        question.is_public = is_public;
    }

    validate_question_shape(question.question_type, &question.options.0, &question.answer.0)?;

    let after = (
        question.content.clone(),
        question.question_type,
        question.options.0.clone(),
        question.answer.0.clone(),
        question.explanation.clone(),
        question.difficulty,
    );
    if before != after {
        question.history.0.push(previous);
        if question.history.0.len() > MAX_REVISIONS {
            let excess = question.history.0.len() - MAX_REVISIONS;
            question.history.0.drain(..excess);
        }
        question.version += 1;
    }

    if question.is_public && !editor.is_admin() {
        question.approval_status = ApprovalStatus::Pending;
        question.reviewed_by = None;
        question.reviewed_at = None;
        question.review_comment = None;
    } else if became_public && editor.is_admin() {
        question.approval_status = ApprovalStatus::Approved;
    }

    question.updated_at = now;
    Ok(())
}

/// Trims, drops empties and de-duplicates while keeping the first spelling.
pub(crate) fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.to_lowercase()))
        .collect()
}
