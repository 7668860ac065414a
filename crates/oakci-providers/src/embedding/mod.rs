//! Embedding providers and the provider chain.
//!
//! The chain tries providers in configured order per request. The primary
//! provider's configured dimensions are authoritative for every collection,
//! and fallbacks with different dimensions are skipped so incompatible
//! vectors never land in one collection.

pub mod chain;
#[cfg(feature = "embedding-fastembed")]
pub mod fastembed;
#[cfg(feature = "embedding-ollama")]
pub mod ollama;
#[cfg(feature = "embedding-openai")]
pub mod openai_compat;

use std::sync::Arc;

use oakci_domain::error::Result;
use oakci_domain::ports::EmbeddingProvider;
use oakci_domain::value_objects::{EmbeddingConfig, EmbeddingProviderConfig, EmbeddingProviderKind};

pub use chain::EmbeddingProviderChain;

/// Truncate to the provider character cap and drop empty strings.
///
/// Shared by every provider so the chain sees identical input handling
/// regardless of which backend serves the request.
pub(crate) fn prepare_texts(texts: &[String], max_chars: usize) -> Vec<String> {
    texts
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| {
            if t.len() > max_chars {
                let mut end = max_chars;
                while !t.is_char_boundary(end) {
                    end -= 1;
                }
                t[..end].to_owned()
            } else {
                t.clone()
            }
        })
        .collect()
}

/// Builds one provider from its configuration entry.
pub fn create_provider(
    entry: &EmbeddingProviderConfig,
    max_chars: usize,
    pull_missing_model: bool,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match entry.provider {
        #[cfg(feature = "embedding-ollama")]
        EmbeddingProviderKind::Ollama => Ok(Arc::new(ollama::OllamaProvider::new(
            entry.model.clone(),
            entry.base_url.clone(),
            entry.dimensions,
            max_chars,
            pull_missing_model,
        ))),
        #[cfg(feature = "embedding-openai")]
        EmbeddingProviderKind::OpenaiCompat => Ok(Arc::new(
            openai_compat::OpenAiCompatProvider::new(
                entry.model.clone(),
                entry.base_url.clone(),
                entry.api_key.clone(),
                entry.dimensions,
                max_chars,
            ),
        )),
        #[cfg(feature = "embedding-fastembed")]
        EmbeddingProviderKind::Fastembed => Ok(Arc::new(fastembed::FastembedProvider::new(
            entry.model.clone(),
            entry.dimensions,
            max_chars,
        ))),
        #[allow(unreachable_patterns)]
        other => Err(oakci_domain::Error::config(format!(
            "embedding provider {other:?} is not enabled in this build"
        ))),
    }
}

/// Builds the full chain (primary plus fallbacks) from configuration.
pub fn create_chain(config: &EmbeddingConfig) -> Result<EmbeddingProviderChain> {
    let mut providers = Vec::with_capacity(1 + config.fallbacks.len());
    providers.push(create_provider(
        &config.primary,
        config.max_chunk_chars,
        config.pull_missing_model,
    )?);
    for entry in &config.fallbacks {
        match create_provider(entry, config.max_chunk_chars, config.pull_missing_model) {
            Ok(provider) => providers.push(provider),
            Err(e) => tracing::warn!(error = %e, "skipping unavailable fallback provider"),
        }
    }
    Ok(EmbeddingProviderChain::new(providers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_texts_truncates_and_skips_empty() {
        let texts = vec![
            "hello world".to_owned(),
            "   ".to_owned(),
            "x".repeat(100),
        ];
        let prepared = prepare_texts(&texts, 10);
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0], "hello worl");
        assert_eq!(prepared[1].len(), 10);
    }

    #[test]
    fn prepare_texts_respects_char_boundaries() {
        let texts = vec!["héllo wörld".to_owned()];
        let prepared = prepare_texts(&texts, 2);
        assert!(prepared[0].len() <= 2);
    }
}
