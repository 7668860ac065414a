//! Middleware stack, outermost first: dynamic CORS, bearer auth,
//! Content-Length cap.

pub mod auth;
pub mod cors;
pub mod limit;
