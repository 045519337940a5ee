use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::User;
use crate::db::types::{UserRole, UserStatus};

const COLUMNS: &str = "\
    id, username, email, hashed_password, display_name, role, status, \
    login_attempts, lock_until, last_login_at, stats, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserListRow {
    #[sqlx(flatten)]
    pub(crate) user: User,
    pub(crate) total_count: i64,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) struct CreateUser<'a> {
    pub(crate) id: &'a str,
    pub(crate) username: &'a str,
    pub(crate) email: Option<&'a str>,
    pub(crate) hashed_password: String,
    pub(crate) display_name: &'a str,
    pub(crate) role: UserRole,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, username, email, hashed_password, display_name, role, status,
            login_attempts, stats, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,'active',0,'{{}}'::jsonb,$7,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.username)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.display_name)
    .bind(params.role)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateProfile {
    pub(crate) display_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) hashed_password: Option<String>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update_profile(
    pool: &PgPool,
    id: &str,
    params: UpdateProfile,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            display_name = COALESCE($1, display_name),
            email = COALESCE($2, email),
            hashed_password = COALESCE($3, hashed_password),
            updated_at = $4
         WHERE id = $5
         RETURNING {COLUMNS}",
    ))
    .bind(params.display_name)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.updated_at)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update_access(
    pool: &PgPool,
    id: &str,
    role: Option<UserRole>,
    status: Option<UserStatus>,
    updated_at: PrimitiveDateTime,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            role = COALESCE($1, role),
            status = COALESCE($2, status),
            updated_at = $3
         WHERE id = $4
         RETURNING {COLUMNS}",
    ))
    .bind(role)
    .bind(status)
    .bind(updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn record_login_failure(
    pool: &PgPool,
    id: &str,
    attempts: i32,
    lock_until: Option<PrimitiveDateTime>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET login_attempts = $1, lock_until = $2 WHERE id = $3")
        .bind(attempts)
        .bind(lock_until)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn record_login_success(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET login_attempts = 0, lock_until = NULL, last_login_at = $1 WHERE id = $2",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Adds one finished exam to the running totals.
pub(crate) async fn add_exam_stats(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    questions: i64,
    correct: i64,
    study_seconds: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET stats = jsonb_build_object(
            'total_exams', COALESCE((stats->>'total_exams')::bigint, 0) + 1,
            'total_questions', COALESCE((stats->>'total_questions')::bigint, 0) + $2,
            'correct_answers', COALESCE((stats->>'correct_answers')::bigint, 0) + $3,
            'study_time_seconds', COALESCE((stats->>'study_time_seconds')::bigint, 0) + $4
         )
         WHERE id = $1",
    )
    .bind(id)
    .bind(questions)
    .bind(correct)
    .bind(study_seconds)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct ListUsersParams {
    pub(crate) role: Option<UserRole>,
    pub(crate) status: Option<UserStatus>,
    pub(crate) search: Option<String>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

pub(crate) async fn list(
    pool: &PgPool,
    params: ListUsersParams,
) -> Result<Vec<UserListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS}, COUNT(*) OVER() AS total_count FROM users WHERE 1=1"
    ));

    if let Some(role) = params.role {
        builder.push(" AND role = ");
        builder.push_bind(role);
    }
    if let Some(status) = params.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(search) = params.search.filter(|value| !value.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (username ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR display_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<UserListRow>().fetch_all(pool).await
}
