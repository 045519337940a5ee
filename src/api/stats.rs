use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::{ApiError, ApiResult};
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::{add_days, format_primitive, primitive_now_utc};
use crate::repositories;
use crate::schemas::stats::{DailyActivity, DailyQuery, OverviewResponse, TypeAccuracy};
use crate::schemas::ApiResponse;
use crate::services::exam_grading::{round_one_decimal, score_percent};

const MAX_DAILY_WINDOW: u32 = 365;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/by-type", get(accuracy_by_type))
        .route("/daily", get(daily_activity))
}

async fn overview(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<OverviewResponse> {
    let exams = repositories::stats::exam_overview(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam statistics"))?;
    let own_questions = repositories::stats::count_own_questions(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    let mistakes = repositories::mistakes::summary(state.db(), &user.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load mistake summary"))?;

    let pending_moderation = if user.is_admin() {
        Some(
            repositories::questions::count_pending(state.db())
                .await
                .map_err(|e| ApiError::internal(e, "Failed to count pending questions"))?,
        )
    } else {
        None
    };

    let accuracy = if exams.total_questions > 0 {
        round_one_decimal(exams.correct_answers as f64 * 100.0 / exams.total_questions as f64)
    } else {
        0.0
    };

    Ok(Json(ApiResponse::ok(OverviewResponse {
        total_exams: exams.total_exams,
        total_questions: exams.total_questions,
        correct_answers: exams.correct_answers,
        accuracy,
        average_score: exams.average_score.map(round_one_decimal).unwrap_or(0.0),
        best_score: exams.best_score.unwrap_or(0.0),
        study_time_seconds: exams.total_duration_seconds,
        last_exam_at: exams.last_exam_at.map(format_primitive),
        own_questions,
        mistakes_active: mistakes.active,
        mistakes_archived: mistakes.archived,
        mistakes_due: mistakes.due,
        pending_moderation,
    })))
}

async fn accuracy_by_type(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<TypeAccuracy>> {
    let rows = repositories::stats::accuracy_by_type(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load accuracy by type"))?;

    let items = rows
        .into_iter()
        .map(|row| TypeAccuracy {
            accuracy: score_percent(
                u32::try_from(row.correct).unwrap_or(u32::MAX),
                u32::try_from(row.total).unwrap_or(u32::MAX),
            ),
            question_type: row.question_type,
            total: row.total,
            correct: row.correct,
        })
        .collect();
    Ok(Json(ApiResponse::ok(items)))
}

async fn daily_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<DailyQuery>,
) -> ApiResult<Vec<DailyActivity>> {
    let days = params.days.clamp(1, MAX_DAILY_WINDOW);
    let since = add_days(primitive_now_utc(), -i64::from(days));

    let rows = repositories::stats::daily_activity(state.db(), &user.id, since)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load daily activity"))?;

    let items = rows
        .into_iter()
        .map(|row| DailyActivity {
            date: row.day,
            exams: row.exams,
            questions: row.questions,
            correct: row.correct,
            study_time_seconds: row.duration_seconds,
        })
        .collect();
    Ok(Json(ApiResponse::ok(items)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::ApprovalStatus;
    use crate::test_support;

    #[tokio::test]
    async fn overview_reflects_submitted_exams() {
        let Some(ctx) = test_support::setup_test_context().await else {
            return;
        };

        let user = test_support::insert_user(ctx.state.db(), "stat_user", "student-pass").await;
        let first =
            test_support::insert_question(ctx.state.db(), &user.id, false, ApprovalStatus::Approved)
                .await;
        let second =
            test_support::insert_question(ctx.state.db(), &user.id, false, ApprovalStatus::Approved)
                .await;
        let token = test_support::bearer_token(&user.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/exams/submit",
                Some(&token),
                Some(json!({
                    "config": {"question_count": 2},
                    "started_at": "2025-01-01T00:00:00Z",
                    "answers": [
                        {"question_id": first.id, "answer": "A"},
                        {"question_id": second.id, "answer": "C"}
                    ]
                })),
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/stats/overview",
                Some(&token),
                None,
            ))
            .await
            .expect("overview");
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"]["total_exams"], 1);
        assert_eq!(body["data"]["accuracy"], 50.0);
        assert_eq!(body["data"]["own_questions"], 2);
        assert_eq!(body["data"]["mistakes_active"], 1);
        assert!(body["data"].get("pending_moderation").is_none());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/stats/by-type",
                Some(&token),
                None,
            ))
            .await
            .expect("by type");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"][0]["question_type"], "single");
        assert_eq!(body["data"][0]["total"], 2);
        assert_eq!(body["data"][0]["accuracy"], 50.0);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/stats/daily?days=7",
                Some(&token),
                None,
            ))
            .await
            .expect("daily");
        let body = test_support::read_json(response).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["data"][0]["questions"], 2);
    }
}
