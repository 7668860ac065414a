//! Dynamic CORS middleware.
//!
//! Static origins (the configured localhost dashboards) and the
//! runtime-mutable set (tunnel and relay URLs) are both consulted per
//! request. Preflights for allowed origins are answered directly; other
//! responses get `Access-Control-Allow-Origin` and `Vary: Origin`
//! injected. Disallowed origins pass through without CORS headers and
//! the browser blocks the response.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use oakci_infrastructure::state::DaemonState;

const MAX_AGE_SECONDS: &str = "600";

/// CORS layer entry point.
pub async fn dynamic_cors(
    State(state): State<Arc<DaemonState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let Some(origin) = origin else {
        // Not a CORS request.
        return next.run(request).await;
    };

    if !state.is_allowed_origin(&origin) {
        return next.run(request).await;
    }

    let origin_value = match HeaderValue::from_str(&origin) {
        Ok(value) => value,
        Err(_) => return next.run(request).await,
    };

    if request.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_value);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE_SECONDS),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_value);
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    response
}
