use crate::db::types::ApprovalStatus;
use crate::repositories;
use crate::test_support;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn generate_hides_answers() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let user = test_support::insert_user(ctx.state.db(), "exam_taker", "student-pass").await;
    for _ in 0..3 {
        test_support::insert_question(ctx.state.db(), &user.id, false, ApprovalStatus::Approved)
            .await;
    }
    let token = test_support::bearer_token(&user.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/exams/generate",
            Some(&token),
            Some(json!({"questionCount": 2, "scope": "personal"})),
        ))
        .await
        .expect("generate");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    let questions = body["data"]["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 2);
    assert!(questions[0].get("answer").is_none());
    assert_eq!(body["data"]["title"], "Practice exam");
}

#[tokio::test]
async fn generate_without_matching_questions_is_rejected() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let user = test_support::insert_user(ctx.state.db(), "empty_bank", "student-pass").await;
    let token = test_support::bearer_token(&user.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/exams/generate",
            Some(&token),
            Some(json!({"question_count": 5})),
        ))
        .await
        .expect("generate");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_grades_and_files_mistakes() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let user = test_support::insert_user(ctx.state.db(), "submitter", "student-pass").await;
    let right =
        test_support::insert_question(ctx.state.db(), &user.id, false, ApprovalStatus::Approved)
            .await;
    let wrong =
        test_support::insert_question(ctx.state.db(), &user.id, false, ApprovalStatus::Approved)
            .await;
    let token = test_support::bearer_token(&user.id, ctx.state.settings());

    let submission = json!({
        "title": "Warm-up",
        "config": {"question_count": 2},
        "startedAt": "2025-01-01T00:00:00Z",
        "answers": [
            {"questionId": right.id, "answer": "a", "timeSpent": 10},
            {"questionId": wrong.id, "answer": "B", "timeSpent": 20}
        ]
    });

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/exams/submit",
            Some(&token),
            Some(submission.clone()),
        ))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["score"], 50.0);
    assert_eq!(body["data"]["grade"], "fail");
    assert_eq!(body["data"]["correct_count"], 1);
    assert_eq!(body["data"]["title"], "Warm-up");

    let mistake = repositories::mistakes::find_by_question(ctx.state.db(), &user.id, &wrong.id)
        .await
        .expect("load mistake")
        .expect("mistake filed");
    assert_eq!(mistake.wrong_count, 1);
    assert_eq!(mistake.user_answer.0, json!("B"));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/exams/submit",
            Some(&token),
            Some(submission),
        ))
        .await
        .expect("submit again");
    assert_eq!(response.status(), StatusCode::CREATED);

    let mistake = repositories::mistakes::find_by_question(ctx.state.db(), &user.id, &wrong.id)
        .await
        .expect("load mistake")
        .expect("mistake filed");
    assert_eq!(mistake.wrong_count, 2);

    let stored = repositories::questions::find_by_id(ctx.state.db(), &right.id)
        .await
        .expect("load question")
        .expect("question");
    assert_eq!(stored.usage_count, 2);
    assert_eq!(stored.correct_count, 2);

    let stored_user = repositories::users::find_by_id(ctx.state.db(), &user.id)
        .await
        .expect("load user")
        .expect("user");
    assert_eq!(stored_user.stats.0.total_exams, 2);
    assert_eq!(stored_user.stats.0.total_questions, 4);
    assert_eq!(stored_user.stats.0.correct_answers, 2);
}

#[tokio::test]
async fn submit_rejects_unknown_questions() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let user = test_support::insert_user(ctx.state.db(), "guesser", "student-pass").await;
    let other = test_support::insert_user(ctx.state.db(), "private_owner", "student-pass").await;
    let hidden =
        test_support::insert_question(ctx.state.db(), &other.id, false, ApprovalStatus::Approved)
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
                "config": {"question_count": 1},
                "started_at": "2025-01-01T00:00:00Z",
                "answers": [{"question_id": hidden.id, "answer": "A"}]
            })),
        ))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shared_records_are_readable_by_code() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let user = test_support::insert_user(ctx.state.db(), "sharer", "student-pass").await;
    let question =
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
                "config": {"question_count": 1},
                "started_at": "2025-01-01T00:00:00Z",
                "answers": [{"question_id": question.id, "answer": "A"}]
            })),
        ))
        .await
        .expect("submit");
    let body = test_support::read_json(response).await;
    let record_id = body["data"]["id"].as_str().expect("id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/records/{record_id}/share"),
            Some(&token),
            Some(json!({"shared": true})),
        ))
        .await
        .expect("share");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    let code = body["data"]["share_code"].as_str().expect("code").to_string();
    assert!(body["data"]["is_public"].as_bool().unwrap_or(false));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/exams/shared/{}", code.to_lowercase()),
            None,
            None,
        ))
        .await
        .expect("shared view");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["id"], record_id.as_str());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/records/{record_id}/share"),
            Some(&token),
            Some(json!({"shared": false})),
        ))
        .await
        .expect("unshare");
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["share_code"], code.as_str());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/exams/shared/{code}"),
            None,
            None,
        ))
        .await
        .expect("shared view");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
