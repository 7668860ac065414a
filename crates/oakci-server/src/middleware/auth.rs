//! Bearer token authentication.
//!
//! A no-op when no token is configured (manual dev starts). Otherwise
//! every `/api/*` request needs `Authorization: Bearer <token>`, except
//! `GET /api/health`, static assets, and the dashboard HTML routes.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use oakci_infrastructure::state::DaemonState;
use serde_json::json;

const ERROR_MISSING: &str = "missing";
const ERROR_INVALID_SCHEME: &str = "invalid scheme";
const ERROR_INVALID_TOKEN: &str = "invalid token";

/// Non-API prefixes served without auth.
const EXEMPT_PREFIXES: &[&str] = &["/static/", "/favicon.png", "/logo.png"];

/// Dashboard shell routes served without auth (exact or with a
/// sub-path).
const DASHBOARD_ROUTES: &[&str] = &[
    "/", "/ui", "/search", "/logs", "/config", "/help", "/activity", "/devtools", "/team",
    "/agents",
];

fn is_exempt(path: &str, method: &Method) -> bool {
    if path == "/api/health" && method == Method::GET {
        return true;
    }
    if EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    if DASHBOARD_ROUTES
        .iter()
        .any(|route| path == *route || path.starts_with(&format!("{route}/")))
    {
        return true;
    }
    // Only /api/* requires auth.
    !path.starts_with("/api/")
}

fn unauthorized(detail: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
}

/// Auth layer entry point.
pub async fn bearer_auth(
    State(state): State<Arc<DaemonState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        // Dev mode: no token configured.
        return next.run(request).await;
    };

    if is_exempt(request.uri().path(), request.method()) {
        return next.run(request).await;
    }

    let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return unauthorized(ERROR_MISSING);
    };

    let mut parts = value.splitn(2, char::is_whitespace);
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().map(str::trim).unwrap_or_default();
    if scheme != "Bearer" || token.is_empty() {
        return unauthorized(ERROR_INVALID_SCHEME);
    }
    if token != expected {
        return unauthorized(ERROR_INVALID_TOKEN);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_exempt_only_for_get() {
        assert!(is_exempt("/api/health", &Method::GET));
        assert!(!is_exempt("/api/health", &Method::POST));
    }

    #[test]
    fn api_paths_require_auth_but_dashboard_does_not() {
        assert!(!is_exempt("/api/search", &Method::POST));
        assert!(!is_exempt("/api/status", &Method::GET));
        assert!(is_exempt("/", &Method::GET));
        assert!(is_exempt("/activity/sessions", &Method::GET));
        assert!(is_exempt("/static/app.js", &Method::GET));
    }
}
