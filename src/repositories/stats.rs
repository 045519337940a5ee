use sqlx::PgPool;
use time::PrimitiveDateTime;

#[derive(Debug, Default, sqlx::FromRow)]
pub(crate) struct ExamOverviewRow {
    pub(crate) total_exams: i64,
    pub(crate) total_questions: i64,
    pub(crate) correct_answers: i64,
    pub(crate) total_duration_seconds: i64,
    pub(crate) average_score: Option<f64>,
    pub(crate) best_score: Option<f64>,
    pub(crate) last_exam_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TypeAccuracyRow {
    pub(crate) question_type: String,
    pub(crate) total: i64,
    pub(crate) correct: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DailyActivityRow {
    pub(crate) day: String,
    pub(crate) exams: i64,
    pub(crate) questions: i64,
    pub(crate) correct: i64,
    pub(crate) duration_seconds: i64,
}

pub(crate) async fn exam_overview(
    pool: &PgPool,
    user_id: &str,
) -> Result<ExamOverviewRow, sqlx::Error> {
    sqlx::query_as::<_, ExamOverviewRow>(
        "SELECT
            COUNT(*) AS total_exams,
            COALESCE(SUM(total_questions), 0)::bigint AS total_questions,
            COALESCE(SUM(correct_count), 0)::bigint AS correct_answers,
            COALESCE(SUM(duration_seconds), 0)::bigint AS total_duration_seconds,
            AVG(score)::float8 AS average_score,
            MAX(score)::float8 AS best_score,
            MAX(completed_at) AS last_exam_at
         FROM exam_records WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn count_own_questions(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE created_by = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Accuracy per question type over every auto-graded exam response.
pub(crate) async fn accuracy_by_type(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<TypeAccuracyRow>, sqlx::Error> {
    sqlx::query_as::<_, TypeAccuracyRow>(
        "SELECT
            response->>'question_type' AS question_type,
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE (response->>'is_correct')::boolean) AS correct
         FROM exam_records,
              jsonb_array_elements(exam_records.responses) AS response
         WHERE exam_records.user_id = $1
           AND response->>'is_correct' IS NOT NULL
         GROUP BY response->>'question_type'
         ORDER BY response->>'question_type'",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn daily_activity(
    pool: &PgPool,
    user_id: &str,
    since: PrimitiveDateTime,
) -> Result<Vec<DailyActivityRow>, sqlx::Error> {
    sqlx::query_as::<_, DailyActivityRow>(
        "SELECT
            to_char(date_trunc('day', completed_at), 'YYYY-MM-DD') AS day,
            COUNT(*) AS exams,
            COALESCE(SUM(total_questions), 0)::bigint AS questions,
            COALESCE(SUM(correct_count), 0)::bigint AS correct,
            COALESCE(SUM(duration_seconds), 0)::bigint AS duration_seconds
         FROM exam_records
         WHERE user_id = $1 AND completed_at >= $2
         GROUP BY 1
         ORDER BY 1",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await
}
