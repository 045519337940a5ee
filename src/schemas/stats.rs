use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct OverviewResponse {
    pub(crate) total_exams: i64,
    pub(crate) total_questions: i64,
    pub(crate) correct_answers: i64,
    pub(crate) accuracy: f64,
    pub(crate) average_score: f64,
    pub(crate) best_score: f64,
    pub(crate) study_time_seconds: i64,
    pub(crate) last_exam_at: Option<String>,
    pub(crate) own_questions: i64,
    pub(crate) mistakes_active: i64,
    pub(crate) mistakes_archived: i64,
    pub(crate) mistakes_due: i64,
    /// Public questions waiting for moderation; admins only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) pending_moderation: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TypeAccuracy {
    pub(crate) question_type: String,
    pub(crate) total: i64,
    pub(crate) correct: i64,
    pub(crate) accuracy: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DailyActivity {
    pub(crate) date: String,
    pub(crate) exams: i64,
    pub(crate) questions: i64,
    pub(crate) correct: i64,
    pub(crate) study_time_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DailyQuery {
    #[serde(default = "default_days")]
    pub(crate) days: u32,
}

fn default_days() -> u32 {
    30
}
