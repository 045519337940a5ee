use axum::{
    body::Body,
    http::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    http::{HeaderName, Method, Request, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    classify::ServerErrorsFailureClass,
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::api::{auth, errors, exams, handlers, mistakes, questions, stats, sync, users};
use crate::core::{config::CorsSettings, state::AppState};

const REQUEST_ID: &str = "x-request-id";

fn request_id_header() -> HeaderName {
    HeaderName::from_static(REQUEST_ID)
}

pub(crate) fn router(state: AppState) -> Router {
    let settings = state.settings();
    errors::set_detailed_errors(settings.runtime().environment.is_development());

    let mut app: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .nest(&settings.api().api_prefix, api_routes());

    if settings.telemetry().prometheus_enabled {
        app = app.route("/metrics", get(handlers::metrics));
    }

    let cors = cors_layer(settings.cors());
    app.layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(request_id_header()))
        .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(record_response)
                .on_failure(|failure: ServerErrorsFailureClass, _: Duration, _: &Span| {
                    tracing::error!(%failure, "Request failed");
                }),
        )
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/questions", questions::router())
        .nest("/mistakes", mistakes::router())
        .nest("/exams", exams::router())
        .nest("/stats", stats::router())
        .nest("/sync", sync::router())
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id
    )
}

fn record_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let status = response.status().as_u16().to_string();
    metrics::counter!("http_requests_total", "status" => status.clone()).increment(1);
    metrics::histogram!("http_request_duration_seconds", "status" => status)
        .record(latency.as_secs_f64());
}

/// Credentials are only allowed with an explicit origin list.
fn cors_layer(cors: &CorsSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, ORIGIN, request_id_header()])
        .expose_headers([request_id_header()])
        .max_age(Duration::from_secs(3600));

    let origins: Vec<HeaderValue> =
        cors.origins.iter().filter_map(|origin| origin.parse().ok()).collect();
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_credentials(true).allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    use super::router;
    use crate::core::{config::Settings, metrics, state::AppState};
    use crate::test_support::{self, json_request, read_json};

    /// Router over a lazy pool; these routes never touch the database.
    fn offline_app(settings: Settings) -> Router {
        let url = settings.database().database_url();
        let db = sqlx::PgPool::connect_lazy(&url).expect("lazy pool");
        router(AppState::new(settings, db))
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        let response = app.oneshot(json_request(Method::GET, uri, None, None)).await.expect("call");
        response.status()
    }

    #[tokio::test]
    async fn root_returns_project_name() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let app = offline_app(Settings::load().expect("settings"));

        let response = app.oneshot(json_request(Method::GET, "/", None, None)).await.expect("call");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"]["message"], "Quizbank API");
        assert_eq!(body["data"]["api_prefix"], "/api");
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let app = offline_app(Settings::load().expect("settings"));

        let request = json_request(Method::GET, "/api/mistakes", None, None);
        let response = app.oneshot(request).await.expect("call");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let app = offline_app(Settings::load().expect("settings"));

        let response = app.oneshot(json_request(Method::GET, "/", None, None)).await.expect("call");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn metrics_route_follows_the_prometheus_flag() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let disabled = offline_app(Settings::load().expect("settings"));
        assert_eq!(status_of(disabled, "/metrics").await, StatusCode::NOT_FOUND);

        std::env::set_var("PROMETHEUS_ENABLED", "1");
        let settings = Settings::load().expect("settings");
        std::env::set_var("PROMETHEUS_ENABLED", "0");
        metrics::init(&settings).expect("metrics init");
        let enabled = offline_app(settings);
        assert_eq!(status_of(enabled, "/metrics").await, StatusCode::OK);
    }
}
