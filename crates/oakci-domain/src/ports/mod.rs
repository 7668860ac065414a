//! Ports implemented by the provider and application layers.

pub mod database;
pub mod providers;
pub mod repositories;

pub use database::{DatabaseExecutor, SqlParam, SqlRow};
pub use providers::{EmbeddingProvider, LlmClient, VectorStoreProvider};
pub use repositories::{
    ActivityRepository, AuditRepository, BatchRepository, ObservationRepository,
    ScheduleRepository, SessionRepository,
};
