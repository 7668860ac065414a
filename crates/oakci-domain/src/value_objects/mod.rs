//! Value objects shared across layers.

pub mod config;
pub mod index_status;
pub mod search;

pub use config::{
    AgentManifest, AutoResolveConfig, BackupConfig, CiConfig, CloudRelayConfig, ConfigAccessor,
    DenyStyle, EmbeddingConfig, EmbeddingProviderConfig, EmbeddingProviderKind, GovernanceConfig,
    GovernanceRule, ProcessingConfig, ServerConfig, SummarizationConfig, TunnelConfig,
    WatcherConfig,
};
pub use index_status::{AstStats, IndexReport, IndexState, IndexStatus};
pub use search::{EmbeddingBatch, VectorHit, VectorRecord};
