use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::services::sync::StudyBundle;

/// The bundle last stored for `user_id`, if any.
pub(crate) async fn find(pool: &PgPool, user_id: &str) -> Result<Option<StudyBundle>, sqlx::Error> {
    let stored: Option<Json<StudyBundle>> =
        sqlx::query_scalar("SELECT document FROM user_data WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(stored.map(|Json(bundle)| bundle))
}

pub(crate) async fn upsert(
    pool: &PgPool,
    user_id: &str,
    document: &StudyBundle,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_data (user_id, document, updated_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (user_id) DO UPDATE SET document = EXCLUDED.document, updated_at = $3",
    )
    .bind(user_id)
    .bind(Json(document))
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}
