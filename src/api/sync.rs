use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use time::OffsetDateTime;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::{format_offset, primitive_now_utc};
use crate::db::models::User;
use crate::repositories;
use crate::schemas::sync::{ExportQuery, ImportResponse, SyncStatusResponse};
use crate::schemas::ApiResponse;
use crate::services::sync::{
    compose_bundle, export_document, import_document, DataType, ServerRows, StudyBundle,
    SyncDocument, FORMAT_VERSION,
};

const SERVER_DEVICE_ID: &str = "server";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/export", get(export_data))
        .route("/import", post(import_data))
        .route("/status", get(sync_status))
}

/// The caller's stored document merged with what the database knows now.
async fn load_bundle(state: &AppState, user: &User) -> Result<StudyBundle, ApiError> {
    let stored = repositories::user_data::find(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user data"))?
        .unwrap_or_default();

    let public_questions = repositories::questions::list_public_approved(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load public questions"))?;
    let personal_questions = repositories::questions::list_personal(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load personal questions"))?;
    let mistakes = repositories::mistakes::list_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mistakes"))?;
    let exams = repositories::exam_records::list_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam records"))?;

    Ok(compose_bundle(
        stored,
        ServerRows {
            public_questions: &public_questions,
            personal_questions: &personal_questions,
            mistakes: &mistakes,
            exams: &exams,
            stats: user.stats.0,
        },
    ))
}

async fn export_data(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ExportQuery>,
) -> ApiResult<SyncDocument> {
    let types = DataType::parse_list(params.types.as_deref())
        .map_err(|kind| ApiError::BadRequest(format!("Unknown data type `{kind}`")))?;

    let bundle = load_bundle(&state, &user).await?;
    let document = export_document(&bundle, SERVER_DEVICE_ID, &types, OffsetDateTime::now_utc())
        .map_err(|e| ApiError::internal(e, "Failed to build sync document"))?;

    Ok(Json(ApiResponse::ok(document)))
}

/// Accepts a raw JSON body so shape errors surface as sync validation
/// failures instead of extractor rejections.
async fn import_data(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<Value>,
) -> ApiResult<ImportResponse> {
    let document =
        SyncDocument::from_value(payload).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut bundle = load_bundle(&state, &user).await?;
    let report =
        import_document(&mut bundle, &document).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    repositories::user_data::upsert(state.db(), &user.id, &bundle, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store user data"))?;

    metrics::counter!("sync_imports_total").increment(1);
    tracing::info!(
        user_id = %user.id,
        device_id = %document.device_id,
        added = report.added(),
        skipped = report.skipped(),
        errors = report.errors.len(),
        "Sync document imported"
    );

    let message = if report.has_errors() {
        "Imported with errors"
    } else {
        "Imported"
    };
    Ok(Json(ApiResponse::with_message(
        message,
        ImportResponse { added: report.added(), skipped: report.skipped(), report },
    )))
}

async fn sync_status() -> ApiResult<SyncStatusResponse> {
    Ok(Json(ApiResponse::ok(SyncStatusResponse {
        status: "ok".to_string(),
        format_version: FORMAT_VERSION.to_string(),
        server_time: format_offset(OffsetDateTime::now_utc()),
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::ApprovalStatus;
    use crate::test_support;

    #[tokio::test]
    async fn status_needs_no_token() {
        let Some(ctx) = test_support::setup_test_context().await else {
            return;
        };

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/sync/status", None, None))
            .await
            .expect("status");
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["format_version"], "2.0");
    }

    #[tokio::test]
    async fn export_includes_database_rows() {
        let Some(ctx) = test_support::setup_test_context().await else {
            return;
        };

        let user = test_support::insert_user(ctx.state.db(), "sync_export", "student-pass").await;
        let own =
            test_support::insert_question(ctx.state.db(), &user.id, false, ApprovalStatus::Approved)
                .await;
        test_support::insert_question(ctx.state.db(), &user.id, true, ApprovalStatus::Approved)
            .await;
        let token = test_support::bearer_token(&user.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/sync/export?types=personalQuestions,publicQuestions",
                Some(&token),
                None,
            ))
            .await
            .expect("export");
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["version"], "2.0");
        assert_eq!(body["data"]["deviceId"], "server");
        assert_eq!(body["data"]["personalQuestions"][0]["id"], own.id.as_str());
        assert_eq!(body["data"]["stats"]["publicQuestions"], 1);
        assert!(body["data"].get("mistakeBank").is_none());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/sync/export?types=bogus",
                Some(&token),
                None,
            ))
            .await
            .expect("export");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn importing_twice_adds_nothing_the_second_time() {
        let Some(ctx) = test_support::setup_test_context().await else {
            return;
        };

        let user = test_support::insert_user(ctx.state.db(), "sync_import", "student-pass").await;
        let token = test_support::bearer_token(&user.id, ctx.state.settings());
        let document = json!({
            "version": "2.0",
            "deviceId": "laptop-1",
            "exportTime": "2025-03-10T12:00:00Z",
            "dataTypes": ["personalQuestions", "mistakeBank"],
            "personalQuestions": [
                {"id": "local-1", "content": "first"},
                {"id": "local-2", "content": "second"}
            ],
            "mistakeBank": "not a list"
        });

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/sync/import",
                Some(&token),
                Some(document.clone()),
            ))
            .await
            .expect("import");
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["added"], 2);
        assert_eq!(body["data"]["errors"][0]["dataType"], "mistakeBank");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/sync/import",
                Some(&token),
                Some(document),
            ))
            .await
            .expect("import again");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["added"], 0);
        assert_eq!(body["data"]["skipped"], 2);
    }

    #[tokio::test]
    async fn invalid_documents_are_rejected() {
        let Some(ctx) = test_support::setup_test_context().await else {
            return;
        };

        let user = test_support::insert_user(ctx.state.db(), "sync_bad", "student-pass").await;
        let token = test_support::bearer_token(&user.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/sync/import",
                Some(&token),
                Some(json!({"version": "2.0", "deviceId": "x", "dataTypes": []})),
            ))
            .await
            .expect("import");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
