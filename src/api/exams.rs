use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::guards::CurrentUser;
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::ExamRecord;
use crate::repositories;
use crate::repositories::questions::Viewer;
use crate::schemas::exam::{
    ExamGenerateRequest, ExamListQuery, ExamPaperResponse, ExamRecordResponse, ExamRecordSummary,
    ExamSubmitRequest, ShareRequest,
};
use crate::schemas::question::PaperQuestion;
use crate::schemas::ApiResponse;
use crate::services::exam_grading::{grade_exam, AnsweredQuestion};
use crate::services::review_scheduler::{self, ReviewState, DEFAULT_IMPORTANCE};
use crate::services::share_codes::{generate_share_code, normalize_share_code};

const DEFAULT_TITLE: &str = "Practice exam";
const SHARE_CODE_ATTEMPTS: usize = 5;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate_exam))
        .route("/submit", post(submit_exam))
        .route("/records", get(list_records))
        .route("/records/:record_id", get(get_record).delete(delete_record))
        .route("/records/:record_id/share", post(share_record))
        .route("/shared/:share_code", get(get_shared_record))
}

fn exam_title(title: Option<String>) -> String {
    title
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

async fn generate_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ExamGenerateRequest>,
) -> ApiResult<ExamPaperResponse> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let config = payload.config();

    let questions = repositories::questions::random_pick(
        state.db(),
        repositories::questions::RandomPick {
            viewer: Viewer { user_id: &user.id, is_admin: user.is_admin() },
            scope: config.scope,
            types: &config.types,
            difficulty: config.difficulty,
            count: i64::from(config.question_count),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to pick questions"))?;

    if questions.is_empty() {
        return Err(ApiError::BadRequest("No questions match the exam settings".to_string()));
    }

    tracing::debug!(
        user_id = %user.id,
        requested = config.question_count,
        picked = questions.len(),
        "Exam paper generated"
    );
    Ok(Json(ApiResponse::ok(ExamPaperResponse {
        title: exam_title(payload.title),
        config,
        questions: questions.into_iter().map(PaperQuestion::from_db).collect(),
        generated_at: format_primitive(primitive_now_utc()),
    })))
}

/// Grades a finished exam, stores the record, bumps question usage and user
/// totals, and files every wrong answer into the mistake book.
async fn submit_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ExamSubmitRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ExamRecordResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut seen = HashSet::new();
    let answers: Vec<_> = payload
        .answers
        .into_iter()
        .filter(|answer| seen.insert(answer.question_id.clone()))
        .collect();
    let ids: Vec<String> = answers.iter().map(|answer| answer.question_id.clone()).collect();

    let questions = repositories::questions::find_many_by_ids(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let by_id: HashMap<&str, _> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    let mut items = Vec::with_capacity(answers.len());
    for answer in answers {
        let question = by_id
            .get(answer.question_id.as_str())
            .copied()
            .filter(|question| question.is_visible_to(&user))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("Unknown question {}", answer.question_id))
            })?;
        items.push(AnsweredQuestion {
            question,
            answer: answer.answer,
            time_spent_seconds: answer.time_spent_seconds,
        });
    }

    let answered_seconds: i64 = items.iter().map(|item| i64::from(item.time_spent_seconds)).sum();
    let graded = grade_exam(items);

    let completed_at = primitive_now_utc();
    let started_at = payload.started_at.min(completed_at);
    let elapsed = (completed_at - started_at).whole_seconds();
    let duration_seconds = if elapsed > 0 { elapsed } else { answered_seconds };
    let duration_seconds = i32::try_from(duration_seconds).unwrap_or(i32::MAX);

    let total_questions = graded.responses.len() as i32;
    let correct_count = graded.correct_count as i32;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let record = repositories::exam_records::create(
        &mut *tx,
        repositories::exam_records::CreateExamRecord {
            id: &Uuid::new_v4().to_string(),
            user_id: &user.id,
            title: &exam_title(payload.title),
            config: payload.config,
            responses: graded.responses.clone(),
            total_questions,
            correct_count,
            score: graded.score,
            grade: graded.grade,
            duration_seconds,
            analysis: graded.analysis.clone(),
            started_at,
            completed_at,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store exam record"))?;

    for response in &graded.responses {
        if let Some(correct) = response.is_correct {
            repositories::questions::record_usage(&mut *tx, &response.question_id, correct)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to update question usage"))?;
        }
    }

    repositories::users::add_exam_stats(
        &mut *tx,
        &user.id,
        i64::from(total_questions),
        i64::from(correct_count),
        i64::from(duration_seconds),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update user stats"))?;

    let mut new_mistakes = 0usize;
    let wrong = graded.responses.iter().filter(|response| response.is_correct == Some(false));
    for response in wrong {
        let question_id = response.question_id.as_str();
        let existing = repositories::mistakes::find_by_question(&mut *tx, &user.id, question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load mistake"))?;

        match existing {
            Some(mistake) => {
                let mut review = ReviewState::from_record(&mistake);
                review_scheduler::register_repeat_mistake(&mut review, completed_at);
                repositories::mistakes::save_review_state(
                    &mut *tx,
                    &mistake.id,
                    &review,
                    Some(response.user_answer.clone()),
                    completed_at,
                )
                .await
                .map_err(|e| ApiError::internal(e, "Failed to update mistake"))?;
            }
            None => {
                let Some(question) = by_id.get(question_id) else {
                    continue;
                };
                repositories::mistakes::create(
                    &mut *tx,
                    repositories::mistakes::CreateMistake {
                        id: &Uuid::new_v4().to_string(),
                        user_id: &user.id,
                        question_id,
                        snapshot: question.snapshot(),
                        user_answer: response.user_answer.clone(),
                        state: ReviewState::new_mistake(DEFAULT_IMPORTANCE, completed_at),
                        notes: None,
                        tags: question.tags.0.clone(),
                        now: completed_at,
                    },
                )
                .await
                .map_err(|e| ApiError::internal(e, "Failed to record mistake"))?;
                new_mistakes += 1;
            }
        }
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam"))?;

    metrics::counter!("exam_submissions_total", "grade" => graded.grade.as_str()).increment(1);
    tracing::info!(
        record_id = %record.id,
        user_id = %user.id,
        score = record.score,
        wrong = graded.wrong_question_ids().count(),
        new_mistakes,
        "Exam submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Exam submitted", ExamRecordResponse::from_db(record))),
    ))
}

async fn list_records(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ExamListQuery>,
) -> ApiResult<PaginatedResponse<ExamRecordSummary>> {
    let (skip, limit) = (params.skip, params.limit);
    let rows = repositories::exam_records::list(state.db(), &user.id, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exam records"))?;

    let page = PaginatedResponse::from_rows(rows, skip, limit, |row| {
        (ExamRecordSummary::from_db(row.record), row.total_count)
    });
    Ok(Json(ApiResponse::ok(page)))
}

async fn load_record(
    state: &AppState,
    user_id: &str,
    record_id: &str,
) -> Result<ExamRecord, ApiError> {
    repositories::exam_records::find_by_id(state.db(), user_id, record_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam record"))?
        .ok_or_else(|| ApiError::not_found("Exam record"))
}

async fn get_record(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(record_id): Path<String>,
) -> ApiResult<ExamRecordResponse> {
    let record = load_record(&state, &user.id, &record_id).await?;
    Ok(Json(ApiResponse::ok(ExamRecordResponse::from_db(record))))
}

async fn delete_record(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(record_id): Path<String>,
) -> ApiResult<()> {
    let deleted = repositories::exam_records::delete_by_id(state.db(), &user.id, &record_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam record"))?;
    if !deleted {
        return Err(ApiError::not_found("Exam record"));
    }
    Ok(Json(ApiResponse::done("Exam record deleted")))
}

async fn share_record(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(record_id): Path<String>,
    Json(payload): Json<ShareRequest>,
) -> ApiResult<ExamRecordResponse> {
    let record = load_record(&state, &user.id, &record_id).await?;

    if !payload.shared {
        let updated =
            repositories::exam_records::set_sharing(state.db(), &user.id, &record.id, None)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to update sharing"))?
                .ok_or_else(|| ApiError::not_found("Exam record"))?;
        return Ok(Json(ApiResponse::with_message(
            "Exam record is private",
            ExamRecordResponse::from_db(updated),
        )));
    }

    for _ in 0..SHARE_CODE_ATTEMPTS {
        let code = record.share_code.clone().unwrap_or_else(generate_share_code);
        let result =
            repositories::exam_records::set_sharing(state.db(), &user.id, &record.id, Some(&code))
                .await;
        match result {
            Ok(Some(updated)) => {
                return Ok(Json(ApiResponse::with_message(
                    "Exam record shared",
                    ExamRecordResponse::from_db(updated),
                )));
            }
            Ok(None) => return Err(ApiError::not_found("Exam record")),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tracing::debug!(record_id = %record.id, "Share code collision, retrying");
            }
            Err(e) => return Err(ApiError::internal(e, "Failed to update sharing")),
        }
    }

    Err(ApiError::Conflict("Could not allocate a share code, try again".to_string()))
}

async fn get_shared_record(
    State(state): State<AppState>,
    Path(share_code): Path<String>,
) -> ApiResult<ExamRecordResponse> {
    let code =
        normalize_share_code(&share_code).ok_or_else(|| ApiError::not_found("Exam record"))?;
    let record = repositories::exam_records::find_shared(state.db(), &code)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam record"))?
        .ok_or_else(|| ApiError::not_found("Exam record"))?;

    Ok(Json(ApiResponse::ok(ExamRecordResponse::from_db(record))))
}

#[cfg(test)]
mod tests;
