use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod auth;
pub(crate) mod exam;
pub(crate) mod mistake;
pub(crate) mod question;
pub(crate) mod stats;
pub(crate) mod sync;
pub(crate) mod user;

/// Body of every API response.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Self {
        Self { success: true, message: "ok".to_string(), data: Some(data) }
    }

    pub(crate) fn with_message(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }
}

impl ApiResponse<()> {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }

    pub(crate) fn done(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), data: None }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
}
