//! Ollama embedding provider.
//!
//! Local model server: availability checks `/api/tags` and resolves the
//! configured model name against the installed list (tags and namespaces
//! tolerated), then embeds one text at a time via `/api/embeddings`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::EmbeddingProvider;
use oakci_domain::value_objects::EmbeddingBatch;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::prepare_texts;

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedding provider backed by a local Ollama server.
pub struct OllamaProvider {
    model: String,
    base_url: String,
    dimensions: usize,
    max_chars: usize,
    pull_missing_model: bool,
    client: reqwest::Client,
    /// Cached availability; `None` until the first probe.
    available: Mutex<Option<bool>>,
    /// Model name as resolved against the server's installed list.
    resolved_model: Mutex<Option<String>>,
}

impl OllamaProvider {
    /// Create a provider for the given model and server.
    #[must_use]
    pub fn new(
        model: String,
        base_url: String,
        dimensions: usize,
        max_chars: usize,
        pull_missing_model: bool,
    ) -> Self {
        Self {
            model,
            base_url: base_url.trim_end_matches('/').to_owned(),
            dimensions,
            max_chars,
            pull_missing_model,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            available: Mutex::new(None),
            resolved_model: Mutex::new(None),
        }
    }

    /// `ns/model:tag` -> `model`.
    fn base_name(full_name: &str) -> &str {
        let without_tag = full_name.split(':').next().unwrap_or(full_name);
        without_tag.rsplit('/').next().unwrap_or(without_tag)
    }

    async fn pull_model(&self) -> Result<()> {
        debug!(model = %self.model, "pulling missing ollama model");
        let response = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&json!({ "name": self.model, "stream": false }))
            .send()
            .await
            .map_err(|e| Error::network_with_source("ollama pull failed", e))?;
        if !response.status().is_success() {
            return Err(Error::embedding(format!(
                "ollama pull returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn probe(&self) -> (bool, String) {
        let response = match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_connect() => {
                return (false, format!("Cannot connect to Ollama at {}", self.base_url));
            }
            Err(e) if e.is_timeout() => {
                return (
                    false,
                    format!("Connection to Ollama timed out at {}", self.base_url),
                );
            }
            Err(e) => return (false, format!("Error checking Ollama: {e}")),
        };

        if !response.status().is_success() {
            return (false, format!("Ollama returned status {}", response.status()));
        }

        let tags: TagsResponse = match response.json().await {
            Ok(t) => t,
            Err(e) => return (false, format!("Invalid Ollama tags response: {e}")),
        };
        let full_names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();

        let model_found = full_names.iter().any(|n| {
            n == &self.model
                || n == &format!("{}:latest", self.model)
                || Self::base_name(n) == self.model
        });

        if !model_found {
            if self.pull_missing_model && self.pull_model().await.is_ok() {
                // Resolved name is just the configured one after a pull.
                *self.resolved_model.lock().expect("resolved model lock") =
                    Some(self.model.clone());
                return (true, "ok".to_owned());
            }
            let display: Vec<String> = full_names
                .iter()
                .take(5)
                .map(|n| format!("{} ({n})", Self::base_name(n)))
                .collect();
            let available = if display.is_empty() {
                "none".to_owned()
            } else {
                display.join(", ")
            };
            return (
                false,
                format!(
                    "Model '{}' not found in Ollama (available: {available})",
                    self.model
                ),
            );
        }

        // Prefer the namespaced install when one matches.
        for full_name in &full_names {
            if Self::base_name(full_name) == self.model || full_name.starts_with(&self.model) {
                let resolved = full_name
                    .split(':')
                    .next()
                    .unwrap_or(full_name)
                    .to_owned();
                debug!(configured = %self.model, resolved = %resolved, "resolved ollama model");
                *self.resolved_model.lock().expect("resolved model lock") = Some(resolved);
                break;
            }
        }

        (true, "ok".to_owned())
    }

    fn request_model(&self) -> String {
        self.resolved_model
            .lock()
            .expect("resolved model lock")
            .clone()
            .unwrap_or_else(|| self.model.clone())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn is_available(&self) -> bool {
        if let Some(cached) = *self.available.lock().expect("availability lock") {
            return cached;
        }
        let (available, _) = self.probe().await;
        *self.available.lock().expect("availability lock") = Some(available);
        available
    }

    async fn check_availability(&self) -> (bool, String) {
        let (available, reason) = self.probe().await;
        *self.available.lock().expect("availability lock") = Some(available);
        (available, reason)
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if !self.is_available().await {
            return Err(Error::embedding(format!(
                "Ollama is not available or model '{}' is not installed",
                self.model
            )));
        }

        let prepared = prepare_texts(texts, self.max_chars);
        let model = self.request_model();
        let mut embeddings = Vec::with_capacity(prepared.len());

        // The embeddings endpoint takes one prompt per request.
        for text in &prepared {
            let response = self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&json!({ "model": model, "prompt": text }))
                .send()
                .await
                .map_err(|e| Error::network_with_source("ollama embed request failed", e))?;

            if !response.status().is_success() {
                return Err(Error::embedding(format!(
                    "ollama embed returned status {}",
                    response.status()
                )));
            }

            let body: EmbeddingsResponse = response
                .json()
                .await
                .map_err(|e| Error::embedding(format!("invalid ollama embed response: {e}")))?;
            if body.embedding.is_empty() {
                return Err(Error::embedding("ollama returned an empty embedding"));
            }
            embeddings.push(body.embedding);
        }

        let dimensions = embeddings.first().map_or(self.dimensions, Vec::len);
        Ok(EmbeddingBatch {
            embeddings,
            model,
            provider: self.name(),
            dimensions,
        })
    }
}
