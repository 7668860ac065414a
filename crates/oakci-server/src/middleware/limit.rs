//! Request body size cap.
//!
//! Rejects any request whose declared `Content-Length` exceeds the
//! configured cap with 413. Chunked bodies fall through to the server's
//! own limits.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use oakci_infrastructure::state::DaemonState;
use serde_json::json;

/// Size-limit layer entry point.
pub async fn body_size_limit(
    State(state): State<Arc<DaemonState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let max_bytes = state.config.get().server.max_request_body_bytes;

    if let Some(length) = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if length > max_bytes {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "detail": "request body too large" })),
            )
                .into_response();
        }
    }

    next.run(request).await
}
