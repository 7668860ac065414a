//! Entities persisted by the activity store and the vector store.

pub mod activity;
pub mod chunk;
pub mod governance;
pub mod observation;
pub mod prompt_batch;
pub mod relationship;
pub mod resolution_event;
pub mod schedule;
pub mod session;

pub use activity::{Activity, NewActivity};
pub use chunk::{ChunkType, CodeChunk, DocType, PlanDocument, SessionSummaryDocument};
pub use governance::{GovernanceAuditEvent, GovernanceDecision, ToolCategory};
pub use observation::{MemoryType, Observation, ObservationStatus};
pub use prompt_batch::{BatchStatus, PromptBatch, PromptSource, SessionClassification};
pub use relationship::{RelationshipOrigin, SessionRelationship};
pub use resolution_event::{ResolutionAction, ResolutionEvent};
pub use schedule::{AgentSchedule, SavedTask};
pub use session::{Session, SessionStats, SessionStatus};
