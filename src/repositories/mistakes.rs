use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{MistakeRecord, QuestionSnapshot};
use crate::services::review_scheduler::ReviewState;

const COLUMNS: &str = "\
    id, user_id, question_id, question_snapshot, user_answer, importance, mastery_level, \
    consecutive_correct, wrong_count, review_count, correct_count, next_review_at, \
    last_reviewed_at, last_wrong_at, is_archived, archived_at, notes, tags, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MistakeListRow {
    #[sqlx(flatten)]
    pub(crate) mistake: MistakeRecord,
    pub(crate) total_count: i64,
}

#[derive(Debug, Default, sqlx::FromRow)]
pub(crate) struct MistakeSummaryRow {
    pub(crate) total: i64,
    pub(crate) active: i64,
    pub(crate) archived: i64,
    pub(crate) due: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MasteryBucket {
    pub(crate) mastery_level: i32,
    pub(crate) count: i64,
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<Option<MistakeRecord>, sqlx::Error> {
    sqlx::query_as::<_, MistakeRecord>(&format!(
        "SELECT {COLUMNS} FROM mistakes WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_question(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    question_id: &str,
) -> Result<Option<MistakeRecord>, sqlx::Error> {
    sqlx::query_as::<_, MistakeRecord>(&format!(
        "SELECT {COLUMNS} FROM mistakes WHERE user_id = $1 AND question_id = $2"
    ))
    .bind(user_id)
    .bind(question_id)
    .fetch_optional(executor)
    .await
}

pub(crate) struct CreateMistake<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) snapshot: QuestionSnapshot,
    pub(crate) user_answer: serde_json::Value,
    pub(crate) state: ReviewState,
    pub(crate) notes: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateMistake<'_>,
) -> Result<MistakeRecord, sqlx::Error> {
    let state = params.state;
    sqlx::query_as::<_, MistakeRecord>(&format!(
        "INSERT INTO mistakes (
            id, user_id, question_id, question_snapshot, user_answer, importance,
            mastery_level, consecutive_correct, wrong_count, review_count, correct_count,
            next_review_at, last_reviewed_at, last_wrong_at, is_archived, archived_at,
            notes, tags, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$19)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.question_id)
    .bind(Json(params.snapshot))
    .bind(Json(params.user_answer))
    .bind(state.importance)
    .bind(state.mastery_level)
    .bind(state.consecutive_correct)
    .bind(state.wrong_count)
    .bind(state.review_count)
    .bind(state.correct_count)
    .bind(state.next_review_at)
    .bind(state.last_reviewed_at)
    .bind(state.last_wrong_at)
    .bind(state.is_archived)
    .bind(state.archived_at)
    .bind(params.notes)
    .bind(Json(params.tags))
    .bind(params.now)
    .fetch_one(executor)
    .await
}

/// Persists scheduler output. `user_answer` is replaced only when given.
pub(crate) async fn save_review_state(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    state: &ReviewState,
    user_answer: Option<serde_json::Value>,
    now: PrimitiveDateTime,
) -> Result<MistakeRecord, sqlx::Error> {
    sqlx::query_as::<_, MistakeRecord>(&format!(
        "UPDATE mistakes SET
            importance = $1,
            mastery_level = $2,
            consecutive_correct = $3,
            wrong_count = $4,
            review_count = $5,
            correct_count = $6,
            next_review_at = $7,
            last_reviewed_at = $8,
            last_wrong_at = $9,
            is_archived = $10,
            archived_at = $11,
            user_answer = COALESCE($12, user_answer),
            updated_at = $13
         WHERE id = $14
         RETURNING {COLUMNS}",
    ))
    .bind(state.importance)
    .bind(state.mastery_level)
    .bind(state.consecutive_correct)
    .bind(state.wrong_count)
    .bind(state.review_count)
    .bind(state.correct_count)
    .bind(state.next_review_at)
    .bind(state.last_reviewed_at)
    .bind(state.last_wrong_at)
    .bind(state.is_archived)
    .bind(state.archived_at)
    .bind(user_answer.map(Json))
    .bind(now)
    .bind(id)
    .fetch_one(executor)
    .await
}

pub(crate) struct UpdateMistakeMeta {
    pub(crate) importance: Option<i32>,
    pub(crate) notes: Option<String>,
    pub(crate) tags: Option<Vec<String>>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update_meta(
    pool: &PgPool,
    user_id: &str,
    id: &str,
    params: UpdateMistakeMeta,
) -> Result<Option<MistakeRecord>, sqlx::Error> {
    sqlx::query_as::<_, MistakeRecord>(&format!(
        "UPDATE mistakes SET
            importance = COALESCE($1, importance),
            notes = COALESCE($2, notes),
            tags = COALESCE($3, tags),
            updated_at = $4
         WHERE id = $5 AND user_id = $6
         RETURNING {COLUMNS}",
    ))
    .bind(params.importance)
    .bind(params.notes)
    .bind(params.tags.map(Json))
    .bind(params.updated_at)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM mistakes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) struct ListMistakesParams {
    pub(crate) archived: Option<bool>,
    pub(crate) importance: Option<i32>,
    pub(crate) tag: Option<String>,
    pub(crate) due_before: Option<PrimitiveDateTime>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

pub(crate) async fn list(
    pool: &PgPool,
    user_id: &str,
    params: ListMistakesParams,
) -> Result<Vec<MistakeListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS}, COUNT(*) OVER() AS total_count FROM mistakes WHERE user_id = "
    ));
    builder.push_bind(user_id.to_string());

    if let Some(archived) = params.archived {
        builder.push(" AND is_archived = ");
        builder.push_bind(archived);
    }
    if let Some(importance) = params.importance {
        builder.push(" AND importance = ");
        builder.push_bind(importance);
    }
    if let Some(tag) = params.tag.filter(|value| !value.trim().is_empty()) {
        builder.push(" AND tags ? ");
        builder.push_bind(tag.trim().to_string());
    }
    if let Some(due_before) = params.due_before {
        builder.push(" AND is_archived = FALSE AND next_review_at <= ");
        builder.push_bind(due_before);
    }

    builder.push(" ORDER BY next_review_at ASC, importance DESC, id OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<MistakeListRow>().fetch_all(pool).await
}

/// Every non-archived record of the user; ranking happens in memory.
pub(crate) async fn list_active(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<MistakeRecord>, sqlx::Error> {
    sqlx::query_as::<_, MistakeRecord>(&format!(
        "SELECT {COLUMNS} FROM mistakes WHERE user_id = $1 AND is_archived = FALSE"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<MistakeRecord>, sqlx::Error> {
    sqlx::query_as::<_, MistakeRecord>(&format!(
        "SELECT {COLUMNS} FROM mistakes WHERE user_id = $1 ORDER BY created_at"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn summary(
    pool: &PgPool,
    user_id: &str,
    now: PrimitiveDateTime,
) -> Result<MistakeSummaryRow, sqlx::Error> {
    sqlx::query_as::<_, MistakeSummaryRow>(
        "SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE is_archived = FALSE) AS active,
            COUNT(*) FILTER (WHERE is_archived = TRUE) AS archived,
            COUNT(*) FILTER (WHERE is_archived = FALSE AND next_review_at <= $2) AS due
         FROM mistakes WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn mastery_distribution(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<MasteryBucket>, sqlx::Error> {
    sqlx::query_as::<_, MasteryBucket>(
        "SELECT mastery_level, COUNT(*) AS count
         FROM mistakes WHERE user_id = $1
         GROUP BY mastery_level
         ORDER BY mastery_level",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
