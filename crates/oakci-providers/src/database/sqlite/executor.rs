//! `SQLite` implementation of the database executor port.
//!
//! Repositories depend on [`DatabaseExecutor`] and [`SqlRow`] and never on
//! sqlx directly. Rows are copied out of the driver so results can be
//! returned as `Arc<dyn SqlRow>` without borrowing the connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::database::{DatabaseExecutor, SqlParam, SqlRow, SqlStatement};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};

/// Detached row with column values bucketed by type.
#[derive(Debug)]
struct SqliteMappedRow {
    strings: HashMap<String, Option<String>>,
    i64s: HashMap<String, Option<i64>>,
    f64s: HashMap<String, Option<f64>>,
}

impl SqliteMappedRow {
    fn from_sqlite_row(row: &SqliteRow) -> Self {
        let mut strings = HashMap::new();
        let mut i64s = HashMap::new();
        let mut f64s = HashMap::new();
        for (i, col) in row.columns().iter().enumerate() {
            let name = col.name().to_owned();
            if let Ok(v) = row.try_get::<i64, _>(i) {
                i64s.insert(name, Some(v));
            } else if let Ok(v) = row.try_get::<f64, _>(i) {
                f64s.insert(name, Some(v));
            } else if let Ok(v) = row.try_get::<String, _>(i) {
                strings.insert(name, Some(v));
            } else if let Ok(opt) = row.try_get::<Option<i64>, _>(i) {
                i64s.insert(name, opt);
            } else if let Ok(opt) = row.try_get::<Option<String>, _>(i) {
                strings.insert(name, opt);
            } else {
                strings.insert(name, None);
            }
        }
        Self {
            strings,
            i64s,
            f64s,
        }
    }
}

impl SqlRow for SqliteMappedRow {
    fn try_get_string(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .strings
            .get(name)
            .cloned()
            .flatten()
            .or_else(|| self.i64s.get(name).and_then(|n| n.map(|v| v.to_string()))))
    }

    fn try_get_i64(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.i64s.get(name).copied().flatten().or_else(|| {
            self.strings
                .get(name)
                .and_then(|s| s.as_ref().and_then(|s| s.parse().ok()))
        }))
    }

    fn try_get_f64(&self, name: &str) -> Result<Option<f64>> {
        Ok(self
            .f64s
            .get(name)
            .copied()
            .flatten()
            .or_else(|| self.i64s.get(name).and_then(|n| n.map(|v| v as f64)))
            .or_else(|| {
                self.strings
                    .get(name)
                    .and_then(|s| s.as_ref().and_then(|s| s.parse().ok()))
            }))
    }
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for p in params {
        query = match p {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::I64(n) => query.bind(*n),
            SqlParam::F64(f) => query.bind(*f),
            SqlParam::Bool(b) => query.bind(i64::from(*b)),
            SqlParam::Null => query.bind(Option::<String>::None),
        };
    }
    query
}

/// `SQLite` executor backed by a sqlx pool.
pub struct SqliteExecutor {
    pool: sqlx::SqlitePool,
}

impl SqliteExecutor {
    /// Create an executor that uses the given pool.
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Reference to the inner pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source(format!("SQL execute failed: {sql}"), e))?;
        Ok(result.rows_affected())
    }

    async fn execute_returning_id(&self, sql: &str, params: &[SqlParam]) -> Result<i64> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source(format!("SQL execute failed: {sql}"), e))?;
        Ok(result.last_insert_rowid())
    }

    async fn execute_batch(&self, statements: Vec<SqlStatement>) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("failed to begin transaction", e))?;
        for (sql, params) in &statements {
            bind_params(sqlx::query(sql), params)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::database_with_source(format!("SQL batch statement failed: {sql}"), e)
                })?;
        }
        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("failed to commit transaction", e))?;
        Ok(())
    }

    async fn query_one(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Arc<dyn SqlRow>>> {
        let row = bind_params(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database_with_source(format!("SQL query_one failed: {sql}"), e))?;
        Ok(row.map(|r| Arc::new(SqliteMappedRow::from_sqlite_row(&r)) as Arc<dyn SqlRow>))
    }

    async fn query_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Arc<dyn SqlRow>>> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database_with_source(format!("SQL query_all failed: {sql}"), e))?;
        Ok(rows
            .iter()
            .map(|r| Arc::new(SqliteMappedRow::from_sqlite_row(r)) as Arc<dyn SqlRow>)
            .collect())
    }
}
