use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::time::format_primitive;
use crate::db::models::{MistakeRecord, QuestionSnapshot};

#[derive(Debug, Deserialize)]
pub(crate) struct MistakeCreate {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    #[serde(default)]
    #[serde(alias = "userAnswer")]
    pub(crate) user_answer: Value,
    #[serde(default)]
    pub(crate) importance: Option<i32>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MistakeUpdate {
    #[serde(default)]
    pub(crate) importance: Option<i32>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    pub(crate) tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    pub(crate) correct: bool,
    #[serde(default)]
    #[serde(alias = "userAnswer")]
    pub(crate) user_answer: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MistakeListQuery {
    #[serde(default)]
    pub(crate) archived: Option<bool>,
    #[serde(default)]
    pub(crate) importance: Option<i32>,
    #[serde(default)]
    pub(crate) tag: Option<String>,
    #[serde(default)]
    pub(crate) due: bool,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionQuery {
    #[serde(default)]
    pub(crate) limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MistakeResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) question: QuestionSnapshot,
    pub(crate) user_answer: Value,
    pub(crate) importance: i32,
    pub(crate) mastery_level: i32,
    pub(crate) consecutive_correct: i32,
    pub(crate) wrong_count: i32,
    pub(crate) review_count: i32,
    pub(crate) correct_count: i32,
    pub(crate) next_review_at: String,
    pub(crate) last_reviewed_at: Option<String>,
    pub(crate) last_wrong_at: String,
    pub(crate) is_archived: bool,
    pub(crate) archived_at: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl MistakeResponse {
    pub(crate) fn from_db(record: MistakeRecord) -> Self {
        Self {
            id: record.id,
            question_id: record.question_id,
            question: record.question_snapshot.0,
            user_answer: record.user_answer.0,
            importance: record.importance,
            mastery_level: record.mastery_level,
            consecutive_correct: record.consecutive_correct,
            wrong_count: record.wrong_count,
            review_count: record.review_count,
            correct_count: record.correct_count,
            next_review_at: format_primitive(record.next_review_at),
            last_reviewed_at: record.last_reviewed_at.map(format_primitive),
            last_wrong_at: format_primitive(record.last_wrong_at),
            is_archived: record.is_archived,
            archived_at: record.archived_at.map(format_primitive),
            notes: record.notes,
            tags: record.tags.0,
            created_at: format_primitive(record.created_at),
            updated_at: format_primitive(record.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionItem {
    pub(crate) priority: f64,
    pub(crate) mistake: MistakeResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewSessionResponse {
    pub(crate) items: Vec<SessionItem>,
    pub(crate) due_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MistakeSummaryResponse {
    pub(crate) total: i64,
    pub(crate) active: i64,
    pub(crate) archived: i64,
    pub(crate) due: i64,
    /// Record count per mastery level, keyed "1".."5".
    pub(crate) by_mastery: BTreeMap<String, i64>,
}
