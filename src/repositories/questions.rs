use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{Question, QuestionOption, QuestionScope};
use crate::db::types::{ApprovalStatus, DifficultyLevel, QuestionType};

pub(crate) const COLUMNS: &str = "\
    id, content, question_type, options, answer, explanation, difficulty, tags, category, \
    is_public, approval_status, reviewed_by, review_comment, reviewed_at, created_by, \
    usage_count, correct_count, version, history, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct QuestionListRow {
    #[sqlx(flatten)]
    pub(crate) question: Question,
    pub(crate) total_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum QuestionSort {
    #[default]
    Newest,
    Oldest,
    MostUsed,
    Hardest,
}

impl QuestionSort {
    fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY created_at DESC, id",
            Self::Oldest => " ORDER BY created_at ASC, id",
            Self::MostUsed => " ORDER BY usage_count DESC, created_at DESC, id",
            Self::Hardest => concat!(
                " ORDER BY (correct_count::float8 / GREATEST(usage_count, 1)) ASC,",
                " usage_count DESC, id"
            ),
        }
    }
}

/// Who is asking, for visibility filtering.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Viewer<'a> {
    pub(crate) user_id: &'a str,
    pub(crate) is_admin: bool,
}

fn push_visibility(
    builder: &mut QueryBuilder<'_, Postgres>,
    viewer: Viewer<'_>,
    scope: QuestionScope,
) {
    match (scope, viewer.is_admin) {
        (QuestionScope::Public, true) => {
            builder.push(" AND is_public = TRUE");
        }
        (QuestionScope::Public, false) => {
            builder.push(" AND is_public = TRUE AND approval_status = 'approved'");
        }
        (QuestionScope::Personal, _) => {
            builder.push(" AND is_public = FALSE AND created_by = ");
            builder.push_bind(viewer.user_id.to_string());
        }
        (QuestionScope::All, true) => {}
        (QuestionScope::All, false) => {
            builder.push(" AND ((is_public = TRUE AND approval_status = 'approved')");
            builder.push(" OR created_by = ");
            builder.push_bind(viewer.user_id.to_string());
            builder.push(")");
        }
    }
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) content: &'a str,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) answer: serde_json::Value,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) tags: Vec<String>,
    pub(crate) category: Option<String>,
    pub(crate) is_public: bool,
    pub(crate) approval_status: ApprovalStatus,
    pub(crate) created_by: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, content, question_type, options, answer, explanation, difficulty, tags,
            category, is_public, approval_status, created_by, usage_count, correct_count,
            version, history, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,0,0,1,'[]'::jsonb,$13,$13)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.content)
    .bind(params.question_type)
    .bind(Json(params.options))
    .bind(Json(params.answer))
    .bind(params.explanation)
    .bind(params.difficulty)
    .bind(Json(params.tags))
    .bind(params.category)
    .bind(params.is_public)
    .bind(params.approval_status)
    .bind(params.created_by)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_many_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(pool)
        .await
}

/// Writes back every editable column of an edited question.
pub(crate) async fn save(pool: &PgPool, question: &Question) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET
            content = $1,
            question_type = $2,
            options = $3,
            answer = $4,
            explanation = $5,
            difficulty = $6,
            tags = $7,
            category = $8,
            is_public = $9,
            approval_status = $10,
            reviewed_by = $11,
            review_comment = $12,
            reviewed_at = $13,
            version = $14,
            history = $15,
            updated_at = $16
         WHERE id = $17
         RETURNING {COLUMNS}",
    ))
    .bind(&question.content)
    .bind(question.question_type)
    .bind(&question.options)
    .bind(&question.answer)
    .bind(&question.explanation)
    .bind(question.difficulty)
    .bind(&question.tags)
    .bind(&question.category)
    .bind(question.is_public)
    .bind(question.approval_status)
    .bind(&question.reviewed_by)
    .bind(&question.review_comment)
    .bind(question.reviewed_at)
    .bind(question.version)
    .bind(&question.history)
    .bind(question.updated_at)
    .bind(&question.id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn moderate(
    pool: &PgPool,
    id: &str,
    status: ApprovalStatus,
    reviewer_id: &str,
    comment: Option<String>,
    now: PrimitiveDateTime,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET
            approval_status = $1,
            reviewed_by = $2,
            review_comment = $3,
            reviewed_at = $4,
            updated_at = $4
         WHERE id = $5 AND is_public = TRUE
         RETURNING {COLUMNS}",
    ))
    .bind(status)
    .bind(reviewer_id)
    .bind(comment)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct ListQuestionsParams<'a> {
    pub(crate) viewer: Viewer<'a>,
    pub(crate) scope: QuestionScope,
    pub(crate) question_type: Option<QuestionType>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) approval_status: Option<ApprovalStatus>,
    pub(crate) tags: Vec<String>,
    pub(crate) category: Option<String>,
    pub(crate) search: Option<String>,
    pub(crate) sort: QuestionSort,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

pub(crate) async fn list(
    pool: &PgPool,
    params: ListQuestionsParams<'_>,
) -> Result<Vec<QuestionListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS}, COUNT(*) OVER() AS total_count FROM questions WHERE 1=1"
    ));
    push_visibility(&mut builder, params.viewer, params.scope);

    if let Some(question_type) = params.question_type {
        builder.push(" AND question_type = ");
        builder.push_bind(question_type);
    }
    if let Some(difficulty) = params.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }
    if let Some(status) = params.approval_status {
        builder.push(" AND approval_status = ");
        builder.push_bind(status);
    }
    if !params.tags.is_empty() {
        builder.push(" AND tags ?| ");
        builder.push_bind(params.tags);
    }
    if let Some(category) = params.category {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }
    if let Some(search) = params.search.filter(|value| !value.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (content ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR COALESCE(explanation, '') ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    builder.push(params.sort.order_by());
    builder.push(" OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<QuestionListRow>().fetch_all(pool).await
}

pub(crate) struct RandomPick<'a> {
    pub(crate) viewer: Viewer<'a>,
    pub(crate) scope: QuestionScope,
    pub(crate) types: &'a [QuestionType],
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) count: i64,
}

/// Random questions for an exam paper. Admins draw from the same pool as
/// everyone else: approved public questions plus their own.
pub(crate) async fn random_pick(
    pool: &PgPool,
    params: RandomPick<'_>,
) -> Result<Vec<Question>, sqlx::Error> {
    let viewer = Viewer { is_admin: false, ..params.viewer };
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM questions WHERE 1=1"));
    push_visibility(&mut builder, viewer, params.scope);

    if !params.types.is_empty() {
        builder.push(" AND question_type = ANY(");
        builder.push_bind(params.types.to_vec());
        builder.push(")");
    }
    if let Some(difficulty) = params.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }

    builder.push(" ORDER BY random() LIMIT ");
    builder.push_bind(params.count.clamp(1, 200));

    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) async fn record_usage(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    correct: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE questions SET
            usage_count = usage_count + 1,
            correct_count = correct_count + CASE WHEN $2 THEN 1 ELSE 0 END
         WHERE id = $1",
    )
    .bind(id)
    .bind(correct)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_public_approved(pool: &PgPool) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE is_public = TRUE AND approval_status = 'approved'
         ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_personal(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE created_by = $1 AND is_public = FALSE
         ORDER BY created_at"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_pending(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM questions WHERE is_public = TRUE AND approval_status = 'pending'",
    )
    .fetch_one(pool)
    .await
}
