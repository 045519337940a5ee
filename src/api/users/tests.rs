use crate::test_support;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn admin_can_list_and_disable_users() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let admin = test_support::insert_admin(ctx.state.db(), "admin_one", "admin-pass").await;
    let learner = test_support::insert_user(ctx.state.db(), "learner_two", "learner-pass").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/users?search=learner",
            Some(&token),
            None,
        ))
        .await
        .expect("list users");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["total_count"], 1);
    assert_eq!(body["data"]["items"][0]["username"], "learner_two");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/users/{}", learner.id),
            Some(&token),
            Some(json!({"status": "disabled"})),
        ))
        .await
        .expect("update user");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["status"], "disabled");

    let learner_token = test_support::bearer_token(&learner.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/auth/me",
            Some(&learner_token),
            None,
        ))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn regular_users_cannot_manage_users() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let learner = test_support::insert_user(ctx.state.db(), "plain_user", "learner-pass").await;
    let token = test_support::bearer_token(&learner.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/users", Some(&token), None))
        .await
        .expect("list users");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let Some(ctx) = test_support::setup_test_context().await else {
        return;
    };

    let admin = test_support::insert_admin(ctx.state.db(), "admin_two", "admin-pass").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/users/does-not-exist",
            Some(&token),
            None,
        ))
        .await
        .expect("get user");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = test_support::read_json(response).await;
    assert_eq!(body["message"], "User not found");
}
