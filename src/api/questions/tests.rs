use crate::db::types::ApprovalStatus;
use crate::test_support;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn public_question_waits_for_moderation() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let author = test_support::insert_user(ctx.state.db(), "author_one", "author-pass").await;
    let reader = test_support::insert_user(ctx.state.db(), "reader_one", "reader-pass").await;
    let admin = test_support::insert_admin(ctx.state.db(), "moderator", "admin-pass").await;
    let author_token = test_support::bearer_token(&author.id, ctx.state.settings());
    let reader_token = test_support::bearer_token(&reader.id, ctx.state.settings());
    let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/questions",
            Some(&author_token),
            Some(json!({
                "content": "Which planet is known as the red planet?",
                "type": "single",
                "options": [
                    {"key": "A", "text": "Mars"},
                    {"key": "B", "text": "Venus"}
                ],
                "answer": "A",
                "tags": ["Space", "space", " astronomy "],
                "isPublic": true
            })),
        ))
        .await
        .expect("create question");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["approval_status"], "pending");
    assert_eq!(body["data"]["tags"], json!(["Space", "astronomy"]));
    let question_id = body["data"]["id"].as_str().expect("id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/questions/{question_id}"),
            Some(&reader_token),
            None,
        ))
        .await
        .expect("get question");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/questions/{question_id}/moderate"),
            Some(&admin_token),
            Some(json!({"decision": "approve", "comment": "clear wording"})),
        ))
        .await
        .expect("moderate");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["approval_status"], "approved");
    assert_eq!(body["data"]["reviewed_by"], admin.id.as_str());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/questions/{question_id}"),
            Some(&reader_token),
            None,
        ))
        .await
        .expect("get question");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_author_can_edit_and_edits_keep_history() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let author = test_support::insert_user(ctx.state.db(), "author_two", "author-pass").await;
    let other = test_support::insert_user(ctx.state.db(), "other_two", "other-pass").await;
    let question =
        test_support::insert_question(ctx.state.db(), &author.id, true, ApprovalStatus::Approved)
            .await;
    let author_token = test_support::bearer_token(&author.id, ctx.state.settings());
    let other_token = test_support::bearer_token(&other.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/questions/{}", question.id),
            Some(&other_token),
            Some(json!({"content": "hijacked"})),
        ))
        .await
        .expect("update question");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/questions/{}", question.id),
            Some(&author_token),
            Some(json!({"content": "Reworded question"})),
        ))
        .await
        .expect("update question");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["approval_status"], "pending");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/questions/{}/history", question.id),
            Some(&author_token),
            None,
        ))
        .await
        .expect("history");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["revisions"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["revisions"][0]["content"], question.content.as_str());
}

#[tokio::test]
async fn personal_scope_lists_only_own_private_questions() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let owner = test_support::insert_user(ctx.state.db(), "owner_three", "owner-pass").await;
    let other = test_support::insert_user(ctx.state.db(), "other_three", "other-pass").await;
    test_support::insert_question(ctx.state.db(), &owner.id, false, ApprovalStatus::Approved)
        .await;
    test_support::insert_question(ctx.state.db(), &other.id, false, ApprovalStatus::Approved)
        .await;
    test_support::insert_question(ctx.state.db(), &other.id, true, ApprovalStatus::Approved)
        .await;
    let token = test_support::bearer_token(&owner.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/questions?scope=personal",
            Some(&token),
            None,
        ))
        .await
        .expect("list questions");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["total_count"], 1);
    assert_eq!(body["data"]["items"][0]["created_by"], owner.id.as_str());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/questions", Some(&token), None))
        .await
        .expect("list questions");
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["total_count"], 2);
}
