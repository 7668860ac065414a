//! Domain constants.

pub mod governance;
pub mod paths;
pub mod processing;
pub mod search;

/// Running daemon version (workspace version).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current relational schema version.
pub const SCHEMA_VERSION: i64 = 7;
