use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption, QuestionRevision, QuestionScope};
use crate::db::types::{ApprovalStatus, DifficultyLevel, QuestionType};
use crate::repositories::questions::QuestionSort;
use crate::services::question_editing::QuestionEdit;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub(crate) content: String,
    #[serde(alias = "type", alias = "questionType")]
    pub(crate) question_type: QuestionType,
    #[serde(default)]
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) answer: Value,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    #[serde(alias = "isPublic")]
    pub(crate) is_public: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub(crate) content: Option<String>,
    #[serde(default)]
    #[serde(alias = "type", alias = "questionType")]
    pub(crate) question_type: Option<QuestionType>,
    #[serde(default)]
    pub(crate) options: Option<Vec<QuestionOption>>,
    #[serde(default)]
    pub(crate) answer: Option<Value>,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) tags: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    #[serde(alias = "isPublic")]
    pub(crate) is_public: Option<bool>,
}

impl QuestionUpdate {
    pub(crate) fn into_edit(self) -> QuestionEdit {
        QuestionEdit {
            content: self.content,
            question_type: self.question_type,
            options: self.options,
            answer: self.answer,
            explanation: self.explanation,
            difficulty: self.difficulty,
            tags: self.tags,
            category: self.category,
            is_public: self.is_public,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    pub(crate) fn status(self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModerationRequest {
    pub(crate) decision: ModerationDecision,
    #[serde(default)]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionListQuery {
    #[serde(default)]
    #[serde(rename = "type", alias = "question_type")]
    pub(crate) question_type: Option<QuestionType>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) status: Option<ApprovalStatus>,
    /// Comma separated; a question matches when it has any of them.
    #[serde(default)]
    pub(crate) tags: Option<String>,
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) scope: QuestionScope,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) sort: QuestionSort,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

impl QuestionListQuery {
    pub(crate) fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) answer: Value,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) tags: Vec<String>,
    pub(crate) category: Option<String>,
    pub(crate) is_public: bool,
    pub(crate) approval_status: ApprovalStatus,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) review_comment: Option<String>,
    pub(crate) reviewed_at: Option<String>,
    pub(crate) created_by: String,
    pub(crate) usage_count: i64,
    pub(crate) correct_count: i64,
    pub(crate) accuracy: Option<f64>,
    pub(crate) version: i32,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        let accuracy = (question.usage_count > 0).then(|| {
            crate::services::exam_grading::round_one_decimal(
                question.correct_count as f64 * 100.0 / question.usage_count as f64,
            )
        });

        Self {
            id: question.id,
            content: question.content,
            question_type: question.question_type,
            options: question.options.0,
            answer: question.answer.0,
            explanation: question.explanation,
            difficulty: question.difficulty,
            tags: question.tags.0,
            category: question.category,
            is_public: question.is_public,
            approval_status: question.approval_status,
            reviewed_by: question.reviewed_by,
            review_comment: question.review_comment,
            reviewed_at: question.reviewed_at.map(format_primitive),
            created_by: question.created_by,
            usage_count: question.usage_count,
            correct_count: question.correct_count,
            accuracy,
            version: question.version,
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionHistoryResponse {
    pub(crate) id: String,
    pub(crate) version: i32,
    pub(crate) revisions: Vec<QuestionRevision>,
}

/// A question as handed out on an exam paper: no answer, no explanation.
#[derive(Debug, Serialize)]
pub(crate) struct PaperQuestion {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) tags: Vec<String>,
}

impl PaperQuestion {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            content: question.content,
            question_type: question.question_type,
            options: question.options.0,
            difficulty: question.difficulty,
            tags: question.tags.0,
        }
    }
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_accepts_camel_case_aliases() {
        let payload: QuestionCreate = serde_json::from_value(json!({
            "content": "2 + 2 = ?",
            "type": "single",
            "options": [{"key": "A", "text": "3"}, {"key": "B", "text": "4"}],
            "answer": "B",
            "isPublic": true
        }))
        .expect("decode");

        assert_eq!(payload.question_type, QuestionType::Single);
        assert_eq!(payload.difficulty, DifficultyLevel::Medium);
        assert!(payload.is_public);
    }

    #[test]
    fn list_query_splits_tags() {
        let query: QuestionListQuery =
            serde_json::from_value(json!({"tags": "math, ,algebra", "sort": "most_used"}))
                .expect("decode");
        assert_eq!(query.tag_list(), vec!["math".to_string(), "algebra".to_string()]);
        assert_eq!(query.sort, QuestionSort::MostUsed);
        assert_eq!(query.scope, QuestionScope::All);
        assert_eq!(query.limit, 100);
    }
}
