//! OpenAI-compatible embedding provider.
//!
//! Speaks `/v1/embeddings` against any compatible endpoint (OpenAI,
//! LM Studio, vLLM). Dimensions are auto-detected from the first response
//! and cached for the rest of the process lifetime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::EmbeddingProvider;
use oakci_domain::value_objects::EmbeddingBatch;
use serde::Deserialize;
use serde_json::json;

use super::prepare_texts;

#[derive(Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedding provider for `/v1/embeddings` endpoints.
pub struct OpenAiCompatProvider {
    model: String,
    base_url: String,
    api_key: Option<String>,
    /// Configured dimensions until the first response corrects them.
    dimensions: AtomicUsize,
    max_chars: usize,
    client: reqwest::Client,
    probed: AtomicBool,
    available: AtomicBool,
}

impl OpenAiCompatProvider {
    /// Create a provider for the given endpoint.
    #[must_use]
    pub fn new(
        model: String,
        base_url: String,
        api_key: Option<String>,
        dimensions: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            model,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            dimensions: AtomicUsize::new(dimensions),
            max_chars,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            probed: AtomicBool::new(false),
            available: AtomicBool::new(false),
        }
    }

    fn embeddings_url(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/embeddings", self.base_url)
        } else {
            format!("{}/v1/embeddings", self.base_url)
        }
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn probe(&self) -> (bool, String) {
        // A one-token embed doubles as the availability probe; model lists
        // are not uniformly implemented across compatible servers.
        let response = self
            .apply_auth(self.client.post(self.embeddings_url()))
            .json(&json!({ "model": self.model, "input": ["ping"] }))
            .send()
            .await;
        match response {
            Ok(r) if r.status().is_success() => (true, "ok".to_owned()),
            Ok(r) => (
                false,
                format!("embedding endpoint returned status {}", r.status()),
            ),
            Err(e) if e.is_connect() => (
                false,
                format!("Cannot connect to embedding endpoint at {}", self.base_url),
            ),
            Err(e) => (false, format!("Error checking embedding endpoint: {e}")),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    fn name(&self) -> String {
        format!("openai-compat:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::Relaxed)
    }

    async fn is_available(&self) -> bool {
        if self.probed.load(Ordering::Relaxed) {
            return self.available.load(Ordering::Relaxed);
        }
        let (available, _) = self.check_availability().await;
        available
    }

    async fn check_availability(&self) -> (bool, String) {
        let (available, reason) = self.probe().await;
        self.available.store(available, Ordering::Relaxed);
        self.probed.store(true, Ordering::Relaxed);
        (available, reason)
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let prepared = prepare_texts(texts, self.max_chars);
        if prepared.is_empty() {
            return Ok(EmbeddingBatch {
                embeddings: Vec::new(),
                model: self.model.clone(),
                provider: self.name(),
                dimensions: self.dimensions(),
            });
        }

        let response = self
            .apply_auth(self.client.post(self.embeddings_url()))
            .json(&json!({ "model": self.model, "input": prepared }))
            .send()
            .await
            .map_err(|e| Error::network_with_source("embedding request failed", e))?;

        if !response.status().is_success() {
            return Err(Error::embedding(format!(
                "embedding endpoint returned status {}",
                response.status()
            )));
        }

        let mut body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("invalid embeddings response: {e}")))?;
        body.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();

        if embeddings.len() != prepared.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, got {}",
                prepared.len(),
                embeddings.len()
            )));
        }

        // First response wins the dimension auto-detection.
        if let Some(first) = embeddings.first() {
            self.dimensions.store(first.len(), Ordering::Relaxed);
        }

        Ok(EmbeddingBatch {
            embeddings,
            model: self.model.clone(),
            provider: self.name(),
            dimensions: self.dimensions(),
        })
    }
}
