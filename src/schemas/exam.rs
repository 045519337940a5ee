use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::PrimitiveDateTime;
use validator::Validate;

use crate::core::time::{format_primitive, parse_rfc3339};
use crate::db::models::{ExamAnalysis, ExamConfig, ExamRecord, ExamResponse, QuestionScope};
use crate::db::types::{DifficultyLevel, ExamGrade, QuestionType};
use crate::schemas::question::PaperQuestion;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamGenerateRequest {
    #[serde(default)]
    #[validate(length(max = 200, message = "title is too long"))]
    pub(crate) title: Option<String>,
    #[serde(alias = "questionCount")]
    #[validate(range(min = 1, max = 200, message = "question_count must be between 1 and 200"))]
    pub(crate) question_count: u32,
    #[serde(default)]
    pub(crate) types: Vec<QuestionType>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) scope: QuestionScope,
    #[serde(default)]
    #[serde(alias = "timeLimitMinutes")]
    pub(crate) time_limit_minutes: Option<u32>,
}

impl ExamGenerateRequest {
    pub(crate) fn config(&self) -> ExamConfig {
        ExamConfig {
            question_count: self.question_count,
            types: self.types.clone(),
            difficulty: self.difficulty,
            scope: self.scope,
            time_limit_minutes: self.time_limit_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamPaperResponse {
    pub(crate) title: String,
    pub(crate) config: ExamConfig,
    pub(crate) questions: Vec<PaperQuestion>,
    pub(crate) generated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AnswerSubmission {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) answer: Value,
    #[serde(default)]
    #[serde(alias = "timeSpent", alias = "timeSpentSeconds")]
    pub(crate) time_spent_seconds: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamSubmitRequest {
    #[serde(default)]
    #[validate(length(max = 200, message = "title is too long"))]
    pub(crate) title: Option<String>,
    pub(crate) config: ExamConfig,
    #[serde(alias = "startedAt", deserialize_with = "deserialize_timestamp")]
    pub(crate) started_at: PrimitiveDateTime,
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub(crate) answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShareRequest {
    pub(crate) shared: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamRecordResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) config: ExamConfig,
    pub(crate) responses: Vec<ExamResponse>,
    pub(crate) total_questions: i32,
    pub(crate) correct_count: i32,
    pub(crate) score: f64,
    pub(crate) grade: ExamGrade,
    pub(crate) duration_seconds: i32,
    pub(crate) analysis: ExamAnalysis,
    pub(crate) is_public: bool,
    pub(crate) share_code: Option<String>,
    pub(crate) started_at: String,
    pub(crate) completed_at: String,
}

impl ExamRecordResponse {
    pub(crate) fn from_db(record: ExamRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            title: record.title,
            config: record.config.0,
            responses: record.responses.0,
            total_questions: record.total_questions,
            correct_count: record.correct_count,
            score: record.score,
            grade: record.grade,
            duration_seconds: record.duration_seconds,
            analysis: record.analysis.0,
            is_public: record.is_public,
            share_code: record.share_code,
            started_at: format_primitive(record.started_at),
            completed_at: format_primitive(record.completed_at),
        }
    }
}

/// List view of a record, without per-question responses.
#[derive(Debug, Serialize)]
pub(crate) struct ExamRecordSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) total_questions: i32,
    pub(crate) correct_count: i32,
    pub(crate) score: f64,
    pub(crate) grade: ExamGrade,
    pub(crate) duration_seconds: i32,
    pub(crate) is_public: bool,
    pub(crate) completed_at: String,
}

impl ExamRecordSummary {
    pub(crate) fn from_db(record: ExamRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            total_questions: record.total_questions,
            correct_count: record.correct_count,
            score: record.score,
            grade: record.grade,
            duration_seconds: record.duration_seconds,
            is_public: record.is_public,
            completed_at: format_primitive(record.completed_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamListQuery {
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<PrimitiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_rfc3339(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid RFC 3339 timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn submit_request_parses_rfc3339_start() {
        let payload: ExamSubmitRequest = serde_json::from_value(json!({
            "config": {"question_count": 1},
            "startedAt": "2025-03-10T12:00:00Z",
            "answers": [{"questionId": "q1", "answer": "A", "timeSpent": 12}]
        }))
        .expect("decode");

        assert_eq!(payload.started_at, datetime!(2025-03-10 12:00));
        assert_eq!(payload.answers[0].time_spent_seconds, 12);
        assert_eq!(payload.config.scope, QuestionScope::All);
    }

    #[test]
    fn submit_request_requires_answers() {
        let payload: ExamSubmitRequest = serde_json::from_value(json!({
            "config": {"question_count": 1},
            "startedAt": "2025-03-10T12:00:00Z",
            "answers": []
        }))
        .expect("decode");

        let errors = payload.validate().expect_err("empty answers");
        assert!(errors.field_errors().contains_key("answers"));
    }
}
