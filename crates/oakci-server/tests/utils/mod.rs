//! Test harness - in-process request dispatch via `tower::ServiceExt::oneshot`.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use oakci_application::capture::ActivityCapture;
use oakci_application::governance::{AuditWriter, GovernanceEngine};
use oakci_application::indexing::IndexingService;
use oakci_application::processor::ActivityProcessor;
use oakci_application::processor::prompts::PromptTemplateConfig;
use oakci_application::search::SearchService;
use oakci_application::vector_index::VectorIndex;
use oakci_domain::error::Result;
use oakci_domain::ports::EmbeddingProvider;
use oakci_domain::value_objects::{CiConfig, EmbeddingBatch, IndexStatus};
use oakci_infrastructure::config::ConfigHandle;
use oakci_infrastructure::paths::CiPaths;
use oakci_infrastructure::state::DaemonState;
use oakci_infrastructure::version::check_version;
use oakci_providers::database::SqliteActivityStore;
use oakci_providers::embedding::EmbeddingProviderChain;
use oakci_providers::vector_store::FilesystemVectorStore;
use oakci_server::build_router;
use tower::ServiceExt;

/// Deterministic embedder: token hashing into a small dense vector, so
/// identical texts embed identically without any external service.
pub struct HashingEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> String {
        "fake:hashing".to_owned()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn check_availability(&self) -> (bool, String) {
        (true, "ok".to_owned())
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let embeddings = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimensions];
                for token in text.to_lowercase().split_whitespace() {
                    let mut h: usize = 5381;
                    for b in token.bytes() {
                        h = h.wrapping_mul(33).wrapping_add(b as usize);
                    }
                    vector[h % self.dimensions] += 1.0;
                }
                let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut vector {
                        *v /= norm;
                    }
                }
                vector
            })
            .collect();
        Ok(EmbeddingBatch {
            embeddings,
            model: "hashing".to_owned(),
            provider: "fake:hashing".to_owned(),
            dimensions: self.dimensions,
        })
    }
}

/// One assembled daemon over tempdirs.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<DaemonState>,
    _project: tempfile::TempDir,
}

/// Builds a full daemon state over tempdirs with fake embeddings.
pub async fn test_app_with(config: CiConfig, auth_token: Option<String>) -> TestApp {
    let project = tempfile::tempdir().expect("project dir");
    let paths = CiPaths::new(project.path());
    std::fs::create_dir_all(paths.data_dir()).expect("data dir");

    // Summarization points nowhere in tests; the processor falls back to
    // heuristics when the endpoint is unreachable.
    let mut config = config;
    config.summarization.enabled = false;
    let handle = ConfigHandle::new(config);

    let store = SqliteActivityStore::open(&paths.activities_db(), "test-machine")
        .await
        .expect("store");
    let executor = store.executor();
    let sessions: Arc<dyn oakci_domain::ports::SessionRepository> = Arc::new(store.sessions());
    let batches: Arc<dyn oakci_domain::ports::BatchRepository> = Arc::new(store.batches());
    let activities: Arc<dyn oakci_domain::ports::ActivityRepository> =
        Arc::new(store.activities());
    let observations: Arc<dyn oakci_domain::ports::ObservationRepository> =
        Arc::new(store.observations());
    let schedules: Arc<dyn oakci_domain::ports::ScheduleRepository> = Arc::new(store.schedules());
    let audit: Arc<dyn oakci_domain::ports::AuditRepository> = Arc::new(store.audit());

    let chain = Arc::new(EmbeddingProviderChain::new(vec![Arc::new(
        HashingEmbedder { dimensions: 16 },
    )]));
    let chain_port: Arc<dyn EmbeddingProvider> = chain.clone();
    let vector_store = Arc::new(FilesystemVectorStore::open(&paths.chroma_dir()).expect("vs"));
    let vector_index = Arc::new(VectorIndex::new(vector_store, chain_port));
    vector_index
        .ensure_collections()
        .await
        .expect("collections");

    let index_status = Arc::new(RwLock::new(IndexStatus::default()));
    let indexing = Arc::new(
        IndexingService::new(
            project.path().to_path_buf(),
            Arc::clone(&vector_index),
            &[],
            Arc::clone(&index_status),
        )
        .expect("indexing"),
    );

    let capture = Arc::new(ActivityCapture::new(
        Arc::clone(&sessions),
        Arc::clone(&batches),
        Arc::clone(&activities),
        project.path().to_string_lossy().into_owned(),
    ));
    let search = Arc::new(SearchService::new(Arc::clone(&vector_index)));
    let processor = Arc::new(ActivityProcessor::new(
        Arc::clone(&sessions),
        Arc::clone(&batches),
        Arc::clone(&activities),
        Arc::clone(&observations),
        Arc::clone(&vector_index),
        handle.accessor(),
        PromptTemplateConfig::load(None),
        "test-machine".to_owned(),
    ));
    let governance = Arc::new(GovernanceEngine::new(&handle.get().governance));
    let audit_writer = Arc::new(AuditWriter::new(Arc::clone(&audit)));
    let version = check_version(&paths.version_stamp());

    let state = Arc::new(DaemonState::new(
        paths,
        auth_token,
        handle,
        "test-machine".to_owned(),
        executor,
        sessions,
        batches,
        activities,
        observations,
        schedules,
        audit,
        vector_index,
        chain,
        capture,
        search,
        indexing,
        processor,
        governance,
        audit_writer,
        index_status,
        version,
    ));

    TestApp {
        router: build_router(Arc::clone(&state)),
        state,
        _project: project,
    }
}

/// Default app: no auth token, default config.
pub async fn test_app() -> TestApp {
    test_app_with(CiConfig::default(), None).await
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    body: Vec<u8>,
}

impl TestResponse {
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body should be valid UTF-8")
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body should be valid JSON")
    }
}

pub async fn dispatch(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should handle request");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("should collect response body")
        .to_bytes()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(router: &Router, path: &str) -> TestResponse {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .expect("valid GET request");
    dispatch(router, request).await
}

pub async fn post(router: &Router, path: &str, body: &str) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_owned()))
        .expect("valid POST request");
    dispatch(router, request).await
}

pub async fn get_auth(router: &Router, path: &str, token: &str) -> TestResponse {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("valid authenticated GET request");
    dispatch(router, request).await
}
