//! Database executor port.
//!
//! Repositories depend on these traits and never on the SQL client crate
//! directly, so the storage backend stays swappable and testable.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// A bind parameter for a SQL statement.
#[derive(Debug, Clone)]
pub enum SqlParam {
    /// Text value.
    Text(String),
    /// 64-bit integer value.
    I64(i64),
    /// 64-bit float value.
    F64(f64),
    /// Boolean value (stored as INTEGER).
    Bool(bool),
    /// NULL.
    Null,
}

impl SqlParam {
    /// Text param from anything string-like.
    pub fn text<S: Into<String>>(value: S) -> Self {
        Self::Text(value.into())
    }

    /// Text param from an optional value, NULL when absent.
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |v| Self::Text(v.to_owned()))
    }

    /// Integer param from an optional value, NULL when absent.
    #[must_use]
    pub fn opt_i64(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::I64)
    }

    /// Float param from an optional value, NULL when absent.
    #[must_use]
    pub fn opt_f64(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::F64)
    }
}

/// A detached row: column values copied out of the driver row so results
/// can outlive the connection.
pub trait SqlRow: Send + Sync {
    /// Text column accessor (integers are stringified on demand).
    fn try_get_string(&self, name: &str) -> Result<Option<String>>;
    /// Integer column accessor.
    fn try_get_i64(&self, name: &str) -> Result<Option<i64>>;
    /// Float column accessor.
    fn try_get_f64(&self, name: &str) -> Result<Option<f64>>;

    /// Boolean accessor over an INTEGER column.
    fn try_get_bool(&self, name: &str) -> Result<bool> {
        Ok(self.try_get_i64(name)?.unwrap_or(0) != 0)
    }

    /// Required text column; errors when NULL or absent.
    fn require_string(&self, name: &str) -> Result<String> {
        self.try_get_string(name)?
            .ok_or_else(|| crate::error::Error::database(format!("missing column: {name}")))
    }

    /// Required integer column; errors when NULL or absent.
    fn require_i64(&self, name: &str) -> Result<i64> {
        self.try_get_i64(name)?
            .ok_or_else(|| crate::error::Error::database(format!("missing column: {name}")))
    }
}

/// One SQL statement with its bind parameters.
pub type SqlStatement = (String, Vec<SqlParam>);

/// Executes SQL against the activity store.
#[async_trait]
pub trait DatabaseExecutor: Send + Sync {
    /// Execute a statement, returning affected row count.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64>;

    /// Execute a statement, returning the last inserted rowid.
    async fn execute_returning_id(&self, sql: &str, params: &[SqlParam]) -> Result<i64>;

    /// Execute several statements inside a single transaction.
    ///
    /// The single-writer invariant for mutations spanning multiple rows
    /// (activity buffer flush, status + resolution-event pairs) hangs on
    /// this method.
    async fn execute_batch(&self, statements: Vec<SqlStatement>) -> Result<()>;

    /// Fetch at most one row.
    async fn query_one(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Arc<dyn SqlRow>>>;

    /// Fetch all rows.
    async fn query_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Arc<dyn SqlRow>>>;
}
