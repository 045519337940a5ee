use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::guards::CurrentUser;
use crate::api::pagination::PaginatedResponse;
use crate::api::questions::load_visible;
use crate::api::validation::validate_importance;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::mistake::{
    MistakeCreate, MistakeListQuery, MistakeResponse, MistakeSummaryResponse, MistakeUpdate,
    ReviewRequest, ReviewSessionResponse, SessionItem, SessionQuery,
};
use crate::schemas::ApiResponse;
use crate::services::question_editing::normalize_tags;
use crate::services::review_scheduler::{
    self, ReviewOutcome, ReviewState, DEFAULT_IMPORTANCE, MAX_MASTERY, MIN_MASTERY,
};

const MAX_SESSION_SIZE: u32 = 100;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_mistakes).post(create_mistake))
        .route("/session", get(review_session))
        .route("/summary", get(mistake_summary))
        .route("/:mistake_id", get(get_mistake).patch(update_mistake).delete(delete_mistake))
        .route("/:mistake_id/review", post(review_mistake))
}

async fn list_mistakes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<MistakeListQuery>,
) -> ApiResult<PaginatedResponse<MistakeResponse>> {
    let (skip, limit) = (params.skip, params.limit);
    let rows = repositories::mistakes::list(
        state.db(),
        &user.id,
        repositories::mistakes::ListMistakesParams {
            archived: params.archived,
            importance: params.importance,
            tag: params.tag,
            due_before: params.due.then(primitive_now_utc),
            skip,
            limit,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list mistakes"))?;

    let page = PaginatedResponse::from_rows(rows, skip, limit, |row| {
        (MistakeResponse::from_db(row.mistake), row.total_count)
    });
    Ok(Json(ApiResponse::ok(page)))
}

/// Adds a question to the caller's mistake book. A question that is already
/// there counts as one more wrong answer instead of a duplicate.
async fn create_mistake(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<MistakeCreate>,
) -> Result<(StatusCode, Json<ApiResponse<MistakeResponse>>), ApiError> {
    let importance = match payload.importance {
        Some(value) => validate_importance(value)?,
        None => DEFAULT_IMPORTANCE,
    };
    let question = load_visible(&state, &user, &payload.question_id).await?;
    let now = primitive_now_utc();

    let existing = repositories::mistakes::find_by_question(state.db(), &user.id, &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mistake"))?;

    if let Some(record) = existing {
        let mut review = ReviewState::from_record(&record);
        review_scheduler::register_repeat_mistake(&mut review, now);
        let updated = repositories::mistakes::save_review_state(
            state.db(),
            &record.id,
            &review,
            Some(payload.user_answer),
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update mistake"))?;

        return Ok((
            StatusCode::OK,
            Json(ApiResponse::with_message(
                "Mistake already recorded, wrong count increased",
                MistakeResponse::from_db(updated),
            )),
        ));
    }

    let record = repositories::mistakes::create(
        state.db(),
        repositories::mistakes::CreateMistake {
            id: &Uuid::new_v4().to_string(),
            user_id: &user.id,
            question_id: &question.id,
            snapshot: question.snapshot(),
            user_answer: payload.user_answer,
            state: ReviewState::new_mistake(importance, now),
            notes: payload.notes.filter(|text| !text.trim().is_empty()),
            tags: normalize_tags(payload.tags),
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create mistake"))?;

    tracing::info!(mistake_id = %record.id, user_id = %user.id, "Mistake recorded");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Mistake recorded", MistakeResponse::from_db(record))),
    ))
}

async fn get_mistake(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(mistake_id): Path<String>,
) -> ApiResult<MistakeResponse> {
    let record = repositories::mistakes::find_by_id(state.db(), &user.id, &mistake_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mistake"))?
        .ok_or_else(|| ApiError::not_found("Mistake"))?;

    Ok(Json(ApiResponse::ok(MistakeResponse::from_db(record))))
}

async fn update_mistake(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(mistake_id): Path<String>,
    Json(payload): Json<MistakeUpdate>,
) -> ApiResult<MistakeResponse> {
    let importance = payload.importance.map(validate_importance).transpose()?;

    let record = repositories::mistakes::update_meta(
        state.db(),
        &user.id,
        &mistake_id,
        repositories::mistakes::UpdateMistakeMeta {
            importance,
            notes: payload.notes,
            tags: payload.tags.map(normalize_tags),
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update mistake"))?
    .ok_or_else(|| ApiError::not_found("Mistake"))?;

    Ok(Json(ApiResponse::with_message("Mistake updated", MistakeResponse::from_db(record))))
}

async fn delete_mistake(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(mistake_id): Path<String>,
) -> ApiResult<()> {
    let deleted = repositories::mistakes::delete_by_id(state.db(), &user.id, &mistake_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete mistake"))?;
    if !deleted {
        return Err(ApiError::not_found("Mistake"));
    }
    Ok(Json(ApiResponse::done("Mistake deleted")))
}

async fn review_mistake(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(mistake_id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<MistakeResponse> {
    let record = repositories::mistakes::find_by_id(state.db(), &user.id, &mistake_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mistake"))?
        .ok_or_else(|| ApiError::not_found("Mistake"))?;

    let now = primitive_now_utc();
    let outcome = ReviewOutcome::from_correct(payload.correct);
    let mut review = ReviewState::from_record(&record);
    review_scheduler::record_review(&mut review, outcome, now);

    let updated = repositories::mistakes::save_review_state(
        state.db(),
        &record.id,
        &review,
        payload.user_answer,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save review"))?;

    let outcome_label = if payload.correct { "correct" } else { "incorrect" };
    metrics::counter!("mistake_reviews_total", "outcome" => outcome_label).increment(1);
    if updated.is_archived && !record.is_archived {
        tracing::info!(mistake_id = %updated.id, user_id = %user.id, "Mistake mastered");
    }

    Ok(Json(ApiResponse::with_message("Review recorded", MistakeResponse::from_db(updated))))
}

async fn review_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SessionQuery>,
) -> ApiResult<ReviewSessionResponse> {
    let limit = params
        .limit
        .unwrap_or(state.settings().review().session_size)
        .clamp(1, MAX_SESSION_SIZE);

    let candidates = repositories::mistakes::list_active(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mistakes"))?;

    let now = primitive_now_utc();
    let due_count = candidates
        .iter()
        .filter(|record| ReviewState::from_record(record).is_due(now))
        .count() as i64;

    let items = review_scheduler::select_for_session(
        candidates,
        now,
        limit as usize,
        ReviewState::from_record,
    )
    .into_iter()
    .map(|ranked| SessionItem {
        priority: ranked.score,
        mistake: MistakeResponse::from_db(ranked.item),
    })
    .collect();

    Ok(Json(ApiResponse::ok(ReviewSessionResponse { items, due_count })))
}

async fn mistake_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<MistakeSummaryResponse> {
    let summary = repositories::mistakes::summary(state.db(), &user.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mistake summary"))?;
    let buckets = repositories::mistakes::mastery_distribution(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mastery distribution"))?;

    let mut by_mastery: BTreeMap<String, i64> =
        (MIN_MASTERY..=MAX_MASTERY).map(|level| (level.to_string(), 0)).collect();
    for bucket in buckets {
        by_mastery.insert(bucket.mastery_level.to_string(), bucket.count);
    }

    Ok(Json(ApiResponse::ok(MistakeSummaryResponse {
        total: summary.total,
        active: summary.active,
        archived: summary.archived,
        due: summary.due,
        by_mastery,
    })))
}
