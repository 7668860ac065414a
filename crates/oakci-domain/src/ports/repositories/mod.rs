//! Repository ports over the activity store.

pub mod activities;
pub mod audit;
pub mod batches;
pub mod observations;
pub mod schedules;
pub mod sessions;

pub use activities::ActivityRepository;
pub use audit::{AuditFilter, AuditRepository, AuditSummary, NewAuditEvent};
pub use batches::{BatchRepository, NewBatch};
pub use observations::{NewObservation, ObservationFilter, ObservationRepository, StatusUpdate};
pub use schedules::ScheduleRepository;
pub use sessions::{NewSession, SessionFilter, SessionRepository};
