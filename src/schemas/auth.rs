use serde::Serialize;

use crate::schemas::user::UserResponse;

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) expires_in_minutes: u64,
    pub(crate) user: UserResponse,
}

impl TokenResponse {
    pub(crate) fn bearer(
        access_token: String,
        expires_in_minutes: u64,
        user: UserResponse,
    ) -> Self {
        Self { access_token, token_type: "bearer".to_string(), expires_in_minutes, user }
    }
}
