//! In-process CPU fallback embedding provider.
//!
//! Loads a fastembed model lazily on first use. Keeps the daemon able to
//! embed when no local model server is running, at CPU speed.

use std::sync::Mutex;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::EmbeddingProvider;
use oakci_domain::value_objects::EmbeddingBatch;
use tracing::info;

use super::prepare_texts;

/// CPU embedding provider backed by fastembed.
pub struct FastembedProvider {
    model_name: String,
    dimensions: usize,
    max_chars: usize,
    model: Mutex<Option<TextEmbedding>>,
}

impl FastembedProvider {
    /// Create a lazy provider; the model loads on first embed.
    #[must_use]
    pub fn new(model_name: String, dimensions: usize, max_chars: usize) -> Self {
        Self {
            model_name,
            dimensions,
            max_chars,
            model: Mutex::new(None),
        }
    }

    fn resolve_model(&self) -> EmbeddingModel {
        match self.model_name.as_str() {
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            _ => EmbeddingModel::NomicEmbedTextV15,
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        let mut guard = self.model.lock().expect("fastembed model lock");
        if guard.is_none() {
            info!(model = %self.model_name, "loading fastembed model");
            let model = TextEmbedding::try_new(
                InitOptions::new(self.resolve_model()).with_show_download_progress(false),
            )
            .map_err(|e| Error::embedding(format!("failed to load fastembed model: {e}")))?;
            *guard = Some(model);
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for FastembedProvider {
    fn name(&self) -> String {
        format!("fastembed:{}", self.model_name)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn is_available(&self) -> bool {
        // Loading is the only failure mode; report available until it fails.
        true
    }

    async fn check_availability(&self) -> (bool, String) {
        match self.ensure_loaded() {
            Ok(()) => (true, "ok".to_owned()),
            Err(e) => (false, e.to_string()),
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let prepared = prepare_texts(texts, self.max_chars);
        if prepared.is_empty() {
            return Ok(EmbeddingBatch {
                embeddings: Vec::new(),
                model: self.model_name.clone(),
                provider: self.name(),
                dimensions: self.dimensions,
            });
        }

        self.ensure_loaded()?;
        let mut guard = self.model.lock().expect("fastembed model lock");
        let model = guard
            .as_mut()
            .ok_or_else(|| Error::embedding("fastembed model not loaded"))?;
        let embeddings = model
            .embed(prepared.clone(), None)
            .map_err(|e| Error::embedding(format!("fastembed embed failed: {e}")))?;

        let dimensions = embeddings.first().map_or(self.dimensions, Vec::len);
        Ok(EmbeddingBatch {
            embeddings,
            model: self.model_name.clone(),
            provider: self.name(),
            dimensions,
        })
    }
}
