//! Daemon configuration tree.
//!
//! Deserialized by the infrastructure loader from `.oak/ci/config.toml`
//! merged with `OAK_CI_*` environment overrides. Services that must honor
//! UI edits without a restart read it through a [`ConfigAccessor`] instead
//! of capturing a snapshot at construction time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Callable returning the current configuration snapshot.
///
/// The processor re-reads thresholds at the start of each cycle through
/// this accessor so configuration edits take effect without a restart.
pub type ConfigAccessor = Arc<dyn Fn() -> CiConfig + Send + Sync>;

/// Root configuration for the Codebase Intelligence daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CiConfig {
    /// Embedding provider chain configuration.
    pub embedding: EmbeddingConfig,
    /// Summarization LLM configuration.
    pub summarization: SummarizationConfig,
    /// Background processor configuration.
    pub processing: ProcessingConfig,
    /// Auto-resolve thresholds.
    pub auto_resolve: AutoResolveConfig,
    /// File watcher configuration.
    pub watcher: WatcherConfig,
    /// Governance rules and enforcement mode.
    pub governance: GovernanceConfig,
    /// Periodic backup configuration.
    pub backup: BackupConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Tunnel subprocess configuration.
    pub tunnel: TunnelConfig,
    /// Cloud relay configuration.
    pub cloud_relay: CloudRelayConfig,
    /// Agent manifests keyed by agent name (deny-response shaping).
    pub agents: Vec<AgentManifest>,
}

/// Supported embedding provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Local model server speaking the Ollama API.
    Ollama,
    /// Any `/v1/embeddings` OpenAI-compatible endpoint.
    OpenaiCompat,
    /// In-process CPU fallback (fastembed).
    Fastembed,
}

/// Configuration for one embedding provider entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingProviderConfig {
    /// Provider kind.
    pub provider: EmbeddingProviderKind,
    /// Model name.
    pub model: String,
    /// Base URL for server-backed providers.
    pub base_url: String,
    /// Optional API key for OpenAI-compatible endpoints.
    pub api_key: Option<String>,
    /// Expected embedding dimensions.
    pub dimensions: usize,
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            model: "nomic-embed-text".to_owned(),
            base_url: "http://localhost:11434".to_owned(),
            api_key: None,
            dimensions: 768,
        }
    }
}

/// Embedding chain configuration: primary provider plus ordered fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Primary provider. Its dimensions are the source of truth for every
    /// collection regardless of runtime availability.
    pub primary: EmbeddingProviderConfig,
    /// Ordered fallback providers.
    pub fallbacks: Vec<EmbeddingProviderConfig>,
    /// Character cap applied to texts before embedding.
    pub max_chunk_chars: usize,
    /// Pull a missing local model instead of failing availability.
    pub pull_missing_model: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            primary: EmbeddingProviderConfig::default(),
            fallbacks: Vec::new(),
            max_chunk_chars: 6000,
            pull_missing_model: false,
        }
    }
}

/// Summarization LLM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// Whether LLM summarization/classification is enabled.
    pub enabled: bool,
    /// Provider label (informational; the client speaks `/v1/chat/completions`).
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Endpoint base URL.
    pub base_url: String,
    /// Optional API key.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "ollama".to_owned(),
            model: "qwen2.5:3b".to_owned(),
            base_url: "http://localhost:11434/v1".to_owned(),
            api_key: None,
            timeout_seconds: 60,
        }
    }
}

impl SummarizationConfig {
    /// Cache key for the summarizer client; the processor only rebuilds the
    /// client when this changes.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.provider, self.model, self.base_url, self.timeout_seconds, self.enabled
        )
    }
}

/// Background processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Seconds between processor cycles.
    pub interval_seconds: u64,
    /// Maximum batches picked up per cycle.
    pub batch_cap: usize,
    /// Minimum activities before a session gets a summary.
    pub min_session_activities: usize,
    /// Seconds after which an idle active session is swept to completed.
    pub stale_session_timeout_seconds: i64,
    /// Token budget for context assembly.
    pub context_token_budget: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            batch_cap: 10,
            min_session_activities: 3,
            stale_session_timeout_seconds: 3600,
            context_token_budget: 4000,
        }
    }
}

/// Auto-resolve thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoResolveConfig {
    /// Whether auto-resolve runs at all.
    pub enabled: bool,
    /// Similarity threshold when both observations share a context.
    pub similarity_threshold: f32,
    /// Stricter threshold when the observations share no context.
    pub similarity_threshold_no_context: f32,
    /// Candidate search limit.
    pub search_limit: usize,
}

impl Default for AutoResolveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: 0.85,
            similarity_threshold_no_context: 0.92,
            search_limit: 10,
        }
    }
}

/// File watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Whether the watcher starts with the daemon.
    pub enabled: bool,
    /// Debounce delay coalescing change bursts.
    pub debounce_seconds: f64,
    /// Minimum interval between incremental reindex runs.
    pub min_reindex_interval_seconds: f64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_seconds: 1.0,
            min_reindex_interval_seconds: 30.0,
        }
    }
}

/// A single governance rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceRule {
    /// Stable rule identifier.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Tool name glob; `*` matches every tool.
    pub tool: String,
    /// Regex searched over the serialized tool input.
    pub pattern: Option<String>,
    /// Glob matched against the file path extracted from the input.
    pub path_pattern: Option<String>,
    /// Action: allow, deny, warn, or observe.
    pub action: String,
    /// Message surfaced to the agent on deny/warn.
    pub message: String,
    /// Disabled rules are skipped at compile time.
    pub enabled: bool,
}

/// Governance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// `observe` (log only) or `enforce` (deny/warn take effect).
    pub enforcement_mode: String,
    /// Ordered rule list; first match wins.
    pub rules: Vec<GovernanceRule>,
    /// Days of audit rows kept by the prune helper.
    pub retention_days: i64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            enforcement_mode: "observe".to_owned(),
            rules: Vec::new(),
            retention_days: 30,
        }
    }
}

/// How an agent's hook protocol expresses a deny decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyStyle {
    /// `hookSpecificOutput.permissionDecision` envelope.
    HookSpecificOutput,
    /// Cursor-style `continue/permission` envelope.
    Cursor,
    /// Agent cannot enforce denies; decisions are logged only.
    #[default]
    Unsupported,
}

/// Minimal agent manifest consumed by the deny-output shaper and the
/// notify receiver. Discovery of manifests is a CLI concern; the daemon
/// only reads the configured list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentManifest {
    /// Agent name as sent by its hooks.
    pub name: String,
    /// Deny envelope style.
    pub deny_style: DenyStyle,
    /// Notification event names mapped to the response-summary action.
    pub response_summary_events: Vec<String>,
}

/// Periodic backup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Whether the auto-backup loop runs.
    pub enabled: bool,
    /// Hours between automatic backups.
    pub interval_hours: u64,
    /// Include the (potentially large) activities table.
    pub include_activities: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24,
            include_activities: false,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Content-Length cap; larger declared bodies get 413.
    pub max_request_body_bytes: u64,
    /// Static allowed CORS origins (localhost dashboards).
    pub cors_origins: Vec<String>,
    /// Seconds allowed for a full index rebuild before 504.
    pub rebuild_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8765,
            max_request_body_bytes: 10 * 1024 * 1024,
            cors_origins: vec![
                "http://localhost:8765".to_owned(),
                "http://127.0.0.1:8765".to_owned(),
            ],
            rebuild_timeout_seconds: 600,
        }
    }
}

/// Tunnel subprocess configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Command template; `{port}` is substituted with the daemon port.
    pub command: String,
    /// Regex with one capture group extracting the public URL from stdout.
    pub url_pattern: String,
    /// Seconds to wait for the URL before failing the start.
    pub start_timeout_seconds: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            command: "ngrok http {port} --log stdout".to_owned(),
            url_pattern: r"url=(https://\S+)".to_owned(),
            start_timeout_seconds: 20,
        }
    }
}

/// Cloud relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudRelayConfig {
    /// Worker name used by the scaffold and deploy steps.
    pub worker_name: String,
    /// Package manager binary for the install step.
    pub package_manager: String,
    /// Deploy CLI binary (wrangler-compatible).
    pub deploy_cli: String,
    /// Relay WebSocket URL once deployed.
    pub relay_url: Option<String>,
    /// Relay auth token persisted after deploy.
    pub relay_token: Option<String>,
}

impl Default for CloudRelayConfig {
    fn default() -> Self {
        Self {
            worker_name: "oak-ci-relay".to_owned(),
            package_manager: "npm".to_owned(),
            deploy_cli: "wrangler".to_owned(),
            relay_url: None,
            relay_token: None,
        }
    }
}

impl CiConfig {
    /// Finds the manifest for an agent by name.
    #[must_use]
    pub fn agent_manifest(&self, name: &str) -> Option<&AgentManifest> {
        self.agents.iter().find(|a| a.name == name)
    }
}
