use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Question, QuestionScope, User};
use crate::db::types::{DifficultyLevel, QuestionType};
use crate::repositories;
use crate::repositories::questions::Viewer;
use crate::schemas::question::{
    ModerationRequest, PaperQuestion, QuestionCreate, QuestionHistoryResponse, QuestionListQuery,
    QuestionResponse, QuestionUpdate,
};
use crate::schemas::ApiResponse;
use crate::services::question_editing::{
    apply_edit, initial_approval, normalize_tags, validate_question_shape,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/random", get(random_questions))
        .route("/:question_id", get(get_question).patch(update_question).delete(delete_question))
        .route("/:question_id/history", get(question_history))
        .route("/:question_id/moderate", post(moderate_question))
}

fn viewer(user: &User) -> Viewer<'_> {
    Viewer { user_id: &user.id, is_admin: user.is_admin() }
}

/// Loads a question the caller may see; anything else is reported as missing.
pub(crate) async fn load_visible(
    state: &AppState,
    user: &User,
    question_id: &str,
) -> Result<Question, ApiError> {
    let question = repositories::questions::find_by_id(state.db(), question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::not_found("Question"))?;

    if question.is_visible_to(user) {
        Ok(question)
    } else {
        Err(ApiError::not_found("Question"))
    }
}

async fn load_editable(
    state: &AppState,
    user: &User,
    question_id: &str,
) -> Result<Question, ApiError> {
    let question = load_visible(state, user, question_id).await?;
    if question.can_edit(user) {
        Ok(question)
    } else {
        Err(ApiError::Forbidden("Only the author or an admin can change this question"))
    }
}

async fn list_questions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<QuestionListQuery>,
) -> ApiResult<PaginatedResponse<QuestionResponse>> {
    let tags = params.tag_list();
    let (skip, limit) = (params.skip, params.limit);

    let rows = repositories::questions::list(
        state.db(),
        repositories::questions::ListQuestionsParams {
            viewer: viewer(&user),
            scope: params.scope,
            question_type: params.question_type,
            difficulty: params.difficulty,
            approval_status: params.status,
            tags,
            category: params.category,
            search: params.search,
            sort: params.sort,
            skip,
            limit,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    let page = PaginatedResponse::from_rows(rows, skip, limit, |row| {
        (QuestionResponse::from_db(row.question), row.total_count)
    });
    Ok(Json(ApiResponse::ok(page)))
}

async fn create_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<ApiResponse<QuestionResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_question_shape(payload.question_type, &payload.options, &payload.answer)
        .map_err(ApiError::BadRequest)?;

    let approval_status = initial_approval(payload.is_public, &user);
    let question = repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            content: payload.content.trim(),
            question_type: payload.question_type,
            options: payload.options,
            answer: payload.answer,
            explanation: payload.explanation.filter(|text| !text.trim().is_empty()),
            difficulty: payload.difficulty,
            tags: normalize_tags(payload.tags),
            category: payload.category.filter(|text| !text.trim().is_empty()),
            is_public: payload.is_public,
            approval_status,
            created_by: &user.id,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    tracing::info!(
        question_id = %question.id,
        user_id = %user.id,
        is_public = question.is_public,
        approval_status = ?question.approval_status,
        "Question created"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Question created", QuestionResponse::from_db(question))),
    ))
}

async fn get_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
) -> ApiResult<QuestionResponse> {
    let question = load_visible(&state, &user, &question_id).await?;
    Ok(Json(ApiResponse::ok(QuestionResponse::from_db(question))))
}

async fn update_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
    Json(payload): Json<QuestionUpdate>,
) -> ApiResult<QuestionResponse> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut question = load_editable(&state, &user, &question_id).await?;

    apply_edit(&mut question, payload.into_edit(), &user, primitive_now_utc())
        .map_err(ApiError::BadRequest)?;

    let saved = repositories::questions::save(state.db(), &question)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    Ok(Json(ApiResponse::with_message("Question updated", QuestionResponse::from_db(saved))))
}

async fn delete_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
) -> ApiResult<()> {
    let question = load_editable(&state, &user, &question_id).await?;

    let deleted = repositories::questions::delete_by_id(state.db(), &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;
    if !deleted {
        return Err(ApiError::not_found("Question"));
    }

    tracing::info!(question_id = %question.id, user_id = %user.id, "Question deleted");
    Ok(Json(ApiResponse::done("Question deleted")))
}

async fn question_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
) -> ApiResult<QuestionHistoryResponse> {
    let question = load_editable(&state, &user, &question_id).await?;
    Ok(Json(ApiResponse::ok(QuestionHistoryResponse {
        id: question.id,
        version: question.version,
        revisions: question.history.0,
    })))
}

async fn moderate_question(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(question_id): Path<String>,
    Json(payload): Json<ModerationRequest>,
) -> ApiResult<QuestionResponse> {
    let comment = payload.comment.filter(|text| !text.trim().is_empty());
    let question = repositories::questions::moderate(
        state.db(),
        &question_id,
        payload.decision.status(),
        &admin.id,
        comment,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to moderate question"))?
    .ok_or_else(|| ApiError::not_found("Public question"))?;

    tracing::info!(
        question_id = %question.id,
        admin_id = %admin.id,
        decision = ?payload.decision,
        "Question moderated"
    );
    Ok(Json(ApiResponse::with_message("Question moderated", QuestionResponse::from_db(question))))
}

#[derive(Debug, Deserialize)]
struct RandomQuery {
    #[serde(default = "default_random_count")]
    count: i64,
    #[serde(default)]
    #[serde(rename = "type")]
    question_type: Option<QuestionType>,
    #[serde(default)]
    difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    scope: QuestionScope,
}

fn default_random_count() -> i64 {
    10
}

async fn random_questions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<RandomQuery>,
) -> ApiResult<Vec<PaperQuestion>> {
    let types: Vec<QuestionType> = params.question_type.into_iter().collect();
    let questions = repositories::questions::random_pick(
        state.db(),
        repositories::questions::RandomPick {
            viewer: viewer(&user),
            scope: params.scope,
            types: &types,
            difficulty: params.difficulty,
            count: params.count,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to pick questions"))?;

    Ok(Json(ApiResponse::ok(questions.into_iter().map(PaperQuestion::from_db).collect())))
}

#[cfg(test)]
mod tests;
