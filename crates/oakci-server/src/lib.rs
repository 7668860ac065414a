//! HTTP API for the OAK Codebase Intelligence daemon.
//!
//! Axum router over the daemon state, wrapped by the middleware stack:
//! dynamic CORS (outermost), bearer-token auth, and a Content-Length cap.

pub mod error;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;

pub use router::{build_router, serve};
