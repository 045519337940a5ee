use std::sync::OnceLock;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::schemas::ApiResponse;

static DETAILED_ERRORS: OnceLock<bool> = OnceLock::new();

/// Whether internal error causes are echoed to clients. Only the first call
/// takes effect.
pub(crate) fn set_detailed_errors(enabled: bool) {
    let _ = DETAILED_ERRORS.set(enabled);
}

fn detailed_errors() -> bool {
    DETAILED_ERRORS.get().copied().unwrap_or(false)
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    Internal { context: String, detail: String },
}

pub(crate) type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        let detail = err.to_string();
        tracing::error!(error = %detail, "{context}");
        Self::Internal { context: context.to_string(), detail }
    }

    pub(crate) fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self, detailed: bool) -> String {
        match self {
            Self::Unauthorized(message) | Self::Forbidden(message) => message.to_string(),
            Self::BadRequest(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::TooManyRequests(message) => message,
            Self::Internal { context, detail } if detailed => format!("{context}: {detail}"),
            Self::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message(detailed_errors());

        let mut response = (status, Json(ApiResponse::failure(message))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
