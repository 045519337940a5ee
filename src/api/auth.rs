use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::guards::CurrentUser;
use crate::api::validation::{validate_password_len, validate_username};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::auth::TokenResponse;
use crate::schemas::user::{LoginRequest, ProfileUpdate, RegisterRequest, UserResponse};
use crate::schemas::ApiResponse;
use crate::services::login_guard::{self, LockoutPolicy, LoginGate};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", axum::routing::patch(update_profile))
}

fn issue_token(state: &AppState, user: User) -> Result<TokenResponse, ApiError> {
    let token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(TokenResponse::bearer(
        token,
        state.settings().security().access_token_expire_minutes,
        UserResponse::from_db(user),
    ))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TokenResponse>>), ApiError> {
    let username = payload.username.trim().to_string();
    validate_username(&username)?;
    validate_password_len(&payload.password)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let existing = repositories::users::exists_by_username(state.db(), &username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Username is already taken".to_string()));
    }

    let email = payload.email.as_deref().map(str::trim).filter(|value| !value.is_empty());
    if let Some(email) = email {
        let taken = repositories::users::exists_by_email(state.db(), email)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check existing email"))?;
        if taken.is_some() {
            return Err(ApiError::Conflict("Email is already registered".to_string()));
        }
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(&username)
        .to_string();

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &username,
            email,
            hashed_password,
            display_name: &display_name,
            role: UserRole::User,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create user"))?;

    tracing::info!(user_id = %user.id, "User registered");
    let response = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::with_message("Registered", response))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let user = repositories::users::find_by_username(state.db(), payload.username.trim())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))?;

    let now = primitive_now_utc();
    match login_guard::login_gate(&user, now) {
        LoginGate::Open => {}
        LoginGate::Disabled => return Err(ApiError::Forbidden("Account is disabled")),
        LoginGate::Locked { until } => {
            return Err(ApiError::TooManyRequests(format!(
                "Account is locked, try again in {} minutes",
                login_guard::minutes_remaining(until, now)
            )));
        }
    }

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect username or password"))?;

    if !verified {
        let auth = state.settings().auth();
        let policy = LockoutPolicy {
            max_attempts: auth.max_login_attempts,
            lock_minutes: auth.lock_minutes,
        };
        let failure = login_guard::register_failure(&user, policy, now);
        repositories::users::record_login_failure(
            state.db(),
            &user.id,
            failure.attempts,
            failure.lock_until,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record login failure"))?;

        if failure.lock_until.is_some() {
            tracing::warn!(user_id = %user.id, attempts = failure.attempts, "Account locked");
            return Err(ApiError::TooManyRequests(format!(
                "Too many failed attempts, account locked for {} minutes",
                auth.lock_minutes
            )));
        }
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    repositories::users::record_login_success(state.db(), &user.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record login"))?;

    let mut user = user;
    user.login_attempts = 0;
    user.lock_until = None;
    user.last_login_at = Some(now);

    Ok(Json(ApiResponse::with_message("Logged in", issue_token(&state, user)?)))
}

async fn me(CurrentUser(user): CurrentUser) -> ApiResult<UserResponse> {
    Ok(Json(ApiResponse::ok(UserResponse::from_db(user))))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ProfileUpdate>,
) -> ApiResult<UserResponse> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let hashed_password = match payload.new_password.as_deref() {
        Some(new_password) => {
            validate_password_len(new_password)?;
            let current = payload.current_password.as_deref().ok_or_else(|| {
                ApiError::BadRequest("Current password is required".to_string())
            })?;
            let verified = security::verify_password(current, &user.hashed_password)
                .map_err(|e| ApiError::internal(e, "Failed to verify password"))?;
            if !verified {
                return Err(ApiError::BadRequest("Current password is incorrect".to_string()));
            }
            Some(
                security::hash_password(new_password)
                    .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
            )
        }
        None => None,
    };

    let email = payload.email.map(|value| value.trim().to_string());
    if let Some(email) = email.as_deref() {
        let owner = repositories::users::exists_by_email(state.db(), email)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check existing email"))?;
        if owner.is_some_and(|owner| owner != user.id) {
            return Err(ApiError::Conflict("Email is already registered".to_string()));
        }
    }

    let updated = repositories::users::update_profile(
        state.db(),
        &user.id,
        repositories::users::UpdateProfile {
            display_name: payload.display_name.map(|value| value.trim().to_string()),
            email,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update profile"))?;

    Ok(Json(ApiResponse::with_message("Profile updated", UserResponse::from_db(updated))))
}
