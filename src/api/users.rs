use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::{ApiError, ApiResult};
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::user::{AdminUserUpdate, UserListQuery, UserResponse};
use crate::schemas::ApiResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:user_id", get(get_user).patch(update_user))
}

async fn list_users(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Query(params): Query<UserListQuery>,
) -> ApiResult<PaginatedResponse<UserResponse>> {
    let (skip, limit) = (params.skip, params.limit);
    let rows = repositories::users::list(
        state.db(),
        repositories::users::ListUsersParams {
            role: params.role,
            status: params.status,
            search: params.search,
            skip,
            limit,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list users"))?;

    let page = PaginatedResponse::from_rows(rows, skip, limit, |row| {
        (UserResponse::from_db(row.user), row.total_count)
    });
    Ok(Json(ApiResponse::ok(page)))
}

async fn get_user(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(user_id): Path<String>,
) -> ApiResult<UserResponse> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(ApiResponse::ok(UserResponse::from_db(user))))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> ApiResult<UserResponse> {
    if user_id == admin.id && (payload.role.is_some() || payload.status.is_some()) {
        return Err(ApiError::BadRequest("Admins cannot change their own access".to_string()));
    }

    let user = repositories::users::update_access(
        state.db(),
        &user_id,
        payload.role,
        payload.status,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update user"))?
    .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        role = ?user.role,
        status = ?user.status,
        "User access updated"
    );
    Ok(Json(ApiResponse::with_message("User updated", UserResponse::from_db(user))))
}

#[cfg(test)]
mod tests;
