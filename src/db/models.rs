use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    ApprovalStatus, DifficultyLevel, ExamGrade, QuestionType, UserRole, UserStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: Option<String>,
    pub(crate) hashed_password: String,
    pub(crate) display_name: String,
    pub(crate) role: UserRole,
    pub(crate) status: UserStatus,
    pub(crate) login_attempts: i32,
    pub(crate) lock_until: Option<PrimitiveDateTime>,
    pub(crate) last_login_at: Option<PrimitiveDateTime>,
    pub(crate) stats: Json<UserStats>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl User {
    pub(crate) fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub(crate) fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Running totals kept on the user row; only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UserStats {
    #[serde(default)]
    pub(crate) total_exams: i64,
    #[serde(default)]
    pub(crate) total_questions: i64,
    #[serde(default)]
    pub(crate) correct_answers: i64,
    #[serde(default)]
    pub(crate) study_time_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QuestionOption {
    pub(crate) key: String,
    pub(crate) text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionRevision {
    pub(crate) version: i32,
    pub(crate) content: String,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) answer: serde_json::Value,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) edited_by: String,
    pub(crate) edited_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) answer: Json<serde_json::Value>,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) tags: Json<Vec<String>>,
    pub(crate) category: Option<String>,
    pub(crate) is_public: bool,
    pub(crate) approval_status: ApprovalStatus,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) review_comment: Option<String>,
    pub(crate) reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) created_by: String,
    pub(crate) usage_count: i64,
    pub(crate) correct_count: i64,
    pub(crate) version: i32,
    pub(crate) history: Json<Vec<QuestionRevision>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Question {
    pub(crate) fn snapshot(&self) -> QuestionSnapshot {
        QuestionSnapshot {
            content: self.content.clone(),
            question_type: self.question_type,
            options: self.options.0.clone(),
            answer: self.answer.0.clone(),
            explanation: self.explanation.clone(),
            difficulty: self.difficulty,
        }
    }

    pub(crate) fn is_visible_to(&self, user: &User) -> bool {
        user.is_admin()
            || self.created_by == user.id
            || (self.is_public && self.approval_status == ApprovalStatus::Approved)
    }

    pub(crate) fn can_edit(&self, user: &User) -> bool {
        user.is_admin() || self.created_by == user.id
    }
}

/// Copy of the question as it looked when the mistake was made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionSnapshot {
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) answer: serde_json::Value,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct MistakeRecord {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) question_id: String,
    pub(crate) question_snapshot: Json<QuestionSnapshot>,
    pub(crate) user_answer: Json<serde_json::Value>,
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
    pub(crate) notes: Option<String>,
    pub(crate) tags: Json<Vec<String>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum QuestionScope {
    Public,
    Personal,
    #[default]
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExamConfig {
    pub(crate) question_count: u32,
    #[serde(default)]
    pub(crate) types: Vec<QuestionType>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) scope: QuestionScope,
    #[serde(default)]
    pub(crate) time_limit_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExamResponse {
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) user_answer: serde_json::Value,
    pub(crate) correct_answer: serde_json::Value,
    /// `None` when the answer needs manual grading.
    pub(crate) is_correct: Option<bool>,
    #[serde(default)]
    pub(crate) time_spent_seconds: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct BucketStats {
    pub(crate) total: u32,
    pub(crate) correct: u32,
    pub(crate) accuracy: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ExamAnalysis {
    pub(crate) by_type: BTreeMap<String, BucketStats>,
    pub(crate) by_difficulty: BTreeMap<String, BucketStats>,
    #[serde(default)]
    pub(crate) ungraded: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamRecord {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) config: Json<ExamConfig>,
    pub(crate) responses: Json<Vec<ExamResponse>>,
    pub(crate) total_questions: i32,
    pub(crate) correct_count: i32,
    pub(crate) score: f64,
    pub(crate) grade: ExamGrade,
    pub(crate) duration_seconds: i32,
    pub(crate) analysis: Json<ExamAnalysis>,
    pub(crate) is_public: bool,
    pub(crate) share_code: Option<String>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}
