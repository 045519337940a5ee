use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::repositories;

const BAD_CREDENTIALS: ApiError = ApiError::Unauthorized("Invalid authentication credentials");

/// Any signed-in, enabled account.
pub(crate) struct CurrentUser(pub(crate) User);

/// Signed-in account with the admin role.
pub(crate) struct CurrentAdmin(pub(crate) User);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(BAD_CREDENTIALS)?;
    let claims = security::verify_token(token, state.settings()).map_err(|_| BAD_CREDENTIALS)?;

    match repositories::users::find_by_id(state.db(), &claims.sub)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
    {
        None => Err(ApiError::Unauthorized("User not found")),
        Some(user) if !user.is_active() => Err(ApiError::Forbidden("Account is disabled")),
        Some(user) => Ok(user),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        authenticate(&parts.headers, state).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let user = authenticate(&parts.headers, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Admin access required"));
        }
        Ok(CurrentAdmin(user))
    }
}
