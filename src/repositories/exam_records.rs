use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{ExamAnalysis, ExamConfig, ExamRecord, ExamResponse};
use crate::db::types::ExamGrade;

const COLUMNS: &str = "\
    id, user_id, title, config, responses, total_questions, correct_count, score, grade, \
    duration_seconds, analysis, is_public, share_code, started_at, completed_at, created_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExamListRow {
    #[sqlx(flatten)]
    pub(crate) record: ExamRecord,
    pub(crate) total_count: i64,
}

pub(crate) struct CreateExamRecord<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) config: ExamConfig,
    pub(crate) responses: Vec<ExamResponse>,
    pub(crate) total_questions: i32,
    pub(crate) correct_count: i32,
    pub(crate) score: f64,
    pub(crate) grade: ExamGrade,
    pub(crate) duration_seconds: i32,
    pub(crate) analysis: ExamAnalysis,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateExamRecord<'_>,
) -> Result<ExamRecord, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "INSERT INTO exam_records (
            id, user_id, title, config, responses, total_questions, correct_count, score,
            grade, duration_seconds, analysis, is_public, share_code, started_at,
            completed_at, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,FALSE,NULL,$12,$13,$13)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.title)
    .bind(Json(params.config))
    .bind(Json(params.responses))
    .bind(params.total_questions)
    .bind(params.correct_count)
    .bind(params.score)
    .bind(params.grade)
    .bind(params.duration_seconds)
    .bind(Json(params.analysis))
    .bind(params.started_at)
    .bind(params.completed_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<Option<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "SELECT {COLUMNS} FROM exam_records WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_shared(
    pool: &PgPool,
    share_code: &str,
) -> Result<Option<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "SELECT {COLUMNS} FROM exam_records WHERE share_code = $1 AND is_public = TRUE"
    ))
    .bind(share_code)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list(
    pool: &PgPool,
    user_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<ExamListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS}, COUNT(*) OVER() AS total_count FROM exam_records WHERE user_id = "
    ));
    builder.push_bind(user_id.to_string());
    builder.push(" ORDER BY completed_at DESC, id OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<ExamListRow>().fetch_all(pool).await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "SELECT {COLUMNS} FROM exam_records WHERE user_id = $1 ORDER BY completed_at"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn delete_by_id(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exam_records WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Publishes the record under `share_code`, or hides it again when `None`.
/// An existing code is kept so links stay stable across unshare/share.
pub(crate) async fn set_sharing(
    pool: &PgPool,
    user_id: &str,
    id: &str,
    share_code: Option<&str>,
) -> Result<Option<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "UPDATE exam_records SET
            is_public = $1,
            share_code = COALESCE(share_code, $2)
         WHERE id = $3 AND user_id = $4
         RETURNING {COLUMNS}",
    ))
    .bind(share_code.is_some())
    .bind(share_code)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
