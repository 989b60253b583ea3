use std::any::Any;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::catch_panic::CatchPanicLayer;

use crate::middleware::{
    self, AppState, auth_routes, cors_layer, reject_disallowed_origin, require_auth, session_gate,
};
use crate::observability::log_request;

const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Assemble the full HTTP pipeline.
///
/// `api` carries the application routes (`/categories`, `/emails`,
/// `/process/...`); they are nested under `/api` behind [`require_auth`].
///
/// Layer order, outermost first: panic catcher, origin rejection, CORS,
/// body limit, request log, session gate. The order is load-bearing: the
/// guard relies on the gate, and rejected origins must never reach CORS.
pub fn build_router(state: AppState, api: Router<AppState>) -> Router {
    let cors = cors_layer(state.config().allowed_origins());
    let auth = auth_routes(state.config().dev_login_enabled());

    // route_layer panics on a router without routes
    let protected = if api.has_routes() {
        api.route_layer(from_fn(require_auth))
    } else {
        api
    };

    let api = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth)
        .merge(protected);

    Router::new()
        .route("/", get(index))
        .nest("/api", api)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), session_gate))
        .layer(from_fn_with_state(state.clone(), log_request))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(from_fn_with_state(state.clone(), reject_disallowed_origin))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Email Sorting API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "auth": "/api/auth",
            "categories": "/api/categories",
            "emails": "/api/emails",
            "process": "/api/process",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Handler panicked");
    middleware::internal_error_response().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{AppConfig, Environment};
    use crate::middleware::{MemorySessionStore, SubjectAccountResolver};
    use crate::oauth::OAuthConfig;

    fn config() -> AppConfig {
        AppConfig::new(OAuthConfig::new(
            "id",
            "secret",
            "http://localhost:8080/api/auth/google/callback".parse().unwrap(),
        ))
        .with_environment(Environment::Test)
    }

    fn app_with(config: AppConfig, api: Router<AppState>) -> Router {
        let state = AppState::new(config, MemorySessionStore::new(), SubjectAccountResolver);
        build_router(state, api)
    }

    fn app(api: Router<AppState>) -> Router {
        app_with(config(), api)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_session() {
        let response = app(Router::new()).oneshot(get_request("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let response = app(Router::new()).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["endpoints"]["auth"], "/api/auth");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = app(Router::new()).oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn test_api_routes_sit_behind_guard() {
        let api = Router::new().route("/categories", get(|| async { "[]" }));
        let response = app(api).oneshot(get_request("/api/categories")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Unauthorized. Please log in." })
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_opaque_500() {
        async fn boom() -> &'static str {
            panic!("database password is hunter2")
        }

        let app = app_with(
            config().with_dev_login_enabled(true),
            Router::new().route("/boom", get(boom)),
        );

        let response = app
            .clone()
            .oneshot(get_request("/api/auth/dev-login?email=a@example.com"))
            .await
            .unwrap();
        let cookie = response
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with("sid="))
            .and_then(|c| c.split(';').next())
            .unwrap()
            .to_string();

        let request = Request::builder()
            .uri("/api/boom")
            .header(axum::http::header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn test_dev_login_route_only_when_enabled() {
        let response = app(Router::new())
            .oneshot(get_request("/api/auth/dev-login"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
