//! SQLite activity store.
//!
//! # Overview
//! Source-of-truth storage for sessions, prompt batches, activities,
//! observations, resolution events, relationships, schedules, saved tasks,
//! and governance audit events. The vector store is a derived index; the
//! `embedded` flag on observations is the sync token between the two.
//!
//! # Architecture
//! Repositories implement the domain repository ports on top of the
//! [`DatabaseExecutor`] port, keeping them decoupled from sqlx.

pub mod activity_repository;
pub mod audit_repository;
pub mod batch_repository;
pub mod executor;
pub mod observation_repository;
pub mod row_convert;
pub mod schedule_repository;
pub mod schema;
pub mod session_repository;

use std::path::Path;
use std::sync::Arc;

use oakci_domain::error::{Error, Result};
use oakci_domain::ports::database::DatabaseExecutor;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use activity_repository::SqliteActivityRepository;
pub use audit_repository::SqliteAuditRepository;
pub use batch_repository::SqliteBatchRepository;
pub use executor::SqliteExecutor;
pub use observation_repository::SqliteObservationRepository;
pub use schedule_repository::SqliteScheduleRepository;
pub use session_repository::SqliteSessionRepository;

/// Opens the activity store and hands out repositories sharing one pool.
pub struct SqliteActivityStore {
    executor: Arc<dyn DatabaseExecutor>,
    machine_id: String,
}

impl SqliteActivityStore {
    /// Opens (creating if needed) the database at `path`, switches it to
    /// WAL mode, and migrates the schema.
    pub async fn open(path: &Path, machine_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::database_with_source(format!("failed to open {}", path.display()), e)
            })?;
        let executor: Arc<dyn DatabaseExecutor> = Arc::new(SqliteExecutor::new(pool));
        schema::ensure_schema(executor.as_ref()).await?;
        Ok(Self {
            executor,
            machine_id: machine_id.to_owned(),
        })
    }

    /// In-memory store for tests.
    pub async fn open_in_memory(machine_id: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::database_with_source("failed to open in-memory store", e))?;
        let executor: Arc<dyn DatabaseExecutor> = Arc::new(SqliteExecutor::new(pool));
        schema::ensure_schema(executor.as_ref()).await?;
        Ok(Self {
            executor,
            machine_id: machine_id.to_owned(),
        })
    }

    /// The shared executor.
    #[must_use]
    pub fn executor(&self) -> Arc<dyn DatabaseExecutor> {
        Arc::clone(&self.executor)
    }

    /// Stable id of this machine, stamped onto provenance columns.
    #[must_use]
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Session repository over this store.
    #[must_use]
    pub fn sessions(&self) -> SqliteSessionRepository {
        SqliteSessionRepository::new(self.executor(), self.machine_id.clone())
    }

    /// Batch repository over this store.
    #[must_use]
    pub fn batches(&self) -> SqliteBatchRepository {
        SqliteBatchRepository::new(self.executor())
    }

    /// Activity repository over this store.
    #[must_use]
    pub fn activities(&self) -> SqliteActivityRepository {
        SqliteActivityRepository::new(self.executor())
    }

    /// Observation repository over this store.
    #[must_use]
    pub fn observations(&self) -> SqliteObservationRepository {
        SqliteObservationRepository::new(self.executor())
    }

    /// Schedule repository over this store.
    #[must_use]
    pub fn schedules(&self) -> SqliteScheduleRepository {
        SqliteScheduleRepository::new(self.executor())
    }

    /// Audit repository over this store.
    #[must_use]
    pub fn audit(&self) -> SqliteAuditRepository {
        SqliteAuditRepository::new(self.executor(), self.machine_id.clone())
    }
}
