//! Embedding provider chain.
//!
//! Ordered providers, first entry is the configured primary. Each embed
//! call walks the chain in order; fallbacks whose dimensions differ from
//! the primary's are skipped so a fallback can never write incompatible
//! vectors into a collection created at the primary's size.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::EmbeddingProvider;
use oakci_domain::value_objects::EmbeddingBatch;
use serde::Serialize;
use tracing::{debug, warn};

/// Per-provider success/failure counters.
#[derive(Default)]
struct UsageCounters {
    success: AtomicU64,
    failure: AtomicU64,
}

/// Status snapshot of one provider in the chain.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
    pub dimensions: usize,
    pub success: u64,
    pub failure: u64,
}

/// Status snapshot of the whole chain, shaped for `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    pub active_provider: Option<String>,
    pub primary_provider: Option<String>,
    pub providers: Vec<ProviderStatus>,
    pub total_embeds: u64,
}

/// Ordered chain of embedding providers behind the provider port.
pub struct EmbeddingProviderChain {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    usage: Vec<UsageCounters>,
    active: Mutex<Option<String>>,
}

impl EmbeddingProviderChain {
    /// Builds a chain; the first provider is the primary.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>) -> Self {
        let usage = providers.iter().map(|_| UsageCounters::default()).collect();
        Self {
            providers,
            usage,
            active: Mutex::new(None),
        }
    }

    /// Number of configured providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain has no providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn track(&self, index: usize, success: bool) {
        if let Some(counters) = self.usage.get(index) {
            if success {
                counters.success.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.failure.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Clears the cached active provider so the next call re-walks the
    /// chain from the top.
    pub fn reset(&self) {
        *self.active.lock().expect("active provider lock") = None;
    }

    /// Probes every provider and returns (name -> reason) for the
    /// unavailable ones. Startup calls this; failures are non-fatal.
    pub async fn probe_all(&self) -> HashMap<String, String> {
        let mut failures = HashMap::new();
        for provider in &self.providers {
            let (available, reason) = provider.check_availability().await;
            if !available {
                failures.insert(provider.name(), reason);
            }
        }
        failures
    }

    /// Snapshot for the status route.
    pub async fn status(&self) -> ChainStatus {
        let mut providers = Vec::with_capacity(self.providers.len());
        let mut total = 0;
        let mut primary_by_usage: Option<(String, u64)> = None;
        for (i, provider) in self.providers.iter().enumerate() {
            let success = self.usage[i].success.load(Ordering::Relaxed);
            let failure = self.usage[i].failure.load(Ordering::Relaxed);
            total += success + failure;
            if success > 0 && primary_by_usage.as_ref().is_none_or(|(_, n)| success > *n) {
                primary_by_usage = Some((provider.name(), success));
            }
            providers.push(ProviderStatus {
                name: provider.name(),
                available: provider.is_available().await,
                dimensions: provider.dimensions(),
                success,
                failure,
            });
        }
        ChainStatus {
            active_provider: self.active.lock().expect("active provider lock").clone(),
            primary_provider: primary_by_usage
                .map(|(name, _)| name)
                .or_else(|| self.providers.first().map(|p| p.name())),
            providers,
            total_embeds: total,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingProviderChain {
    fn name(&self) -> String {
        self.active
            .lock()
            .expect("active provider lock")
            .clone()
            .unwrap_or_else(|| "chain:none".to_owned())
    }

    /// Dimensions of the primary (configured) provider, regardless of
    /// availability. Configuration is the source of truth so a
    /// slow-starting primary cannot cause collections to be created at a
    /// fallback's size on cold start.
    fn dimensions(&self) -> usize {
        self.providers.first().map_or(768, |p| p.dimensions())
    }

    async fn is_available(&self) -> bool {
        for provider in &self.providers {
            if provider.is_available().await {
                return true;
            }
        }
        false
    }

    async fn check_availability(&self) -> (bool, String) {
        let failures = self.probe_all().await;
        if failures.len() < self.providers.len() {
            (true, "ok".to_owned())
        } else {
            let detail: Vec<String> =
                failures.into_iter().map(|(n, r)| format!("{n}: {r}")).collect();
            (false, detail.join("; "))
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let mut last_error: Option<Error> = None;
        let primary_dimensions = self.dimensions();

        for (i, provider) in self.providers.iter().enumerate() {
            if !provider.is_available().await {
                continue;
            }

            // Fallbacks at a different size would corrupt the collection.
            if i > 0 && provider.dimensions() != primary_dimensions {
                warn!(
                    provider = %provider.name(),
                    dimensions = provider.dimensions(),
                    primary = primary_dimensions,
                    "skipping fallback with mismatched dimensions"
                );
                continue;
            }

            match provider.embed(texts).await {
                Ok(result) => {
                    self.track(i, true);
                    *self.active.lock().expect("active provider lock") = Some(provider.name());
                    return Ok(result);
                }
                Err(e) => {
                    self.track(i, false);
                    debug!(provider = %provider.name(), error = %e, "provider failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => Error::embedding(format!(
                "All embedding providers failed ({e}). Ensure your local model server is running \
                 or configure an alternative provider."
            )),
            None => Error::embedding(
                "No embedding providers available. Ensure your local model server is running \
                 or configure an alternative provider.",
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic in-process provider for chain tests.
    struct FakeProvider {
        name: String,
        dimensions: usize,
        available: bool,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn check_availability(&self) -> (bool, String) {
            (self.available, String::new())
        }

        async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
            if self.fail {
                return Err(Error::embedding("forced failure"));
            }
            Ok(EmbeddingBatch {
                embeddings: texts.iter().map(|_| vec![0.5; self.dimensions]).collect(),
                model: "fake".to_owned(),
                provider: self.name.clone(),
                dimensions: self.dimensions,
            })
        }
    }

    fn provider(name: &str, dims: usize, available: bool, fail: bool) -> Arc<dyn EmbeddingProvider> {
        Arc::new(FakeProvider {
            name: name.to_owned(),
            dimensions: dims,
            available,
            fail,
        })
    }

    #[tokio::test]
    async fn dimensions_follow_primary_even_when_unavailable() {
        let chain = EmbeddingProviderChain::new(vec![
            provider("primary", 768, false, false),
            provider("fallback", 384, true, false),
        ]);
        assert_eq!(chain.dimensions(), 768);
    }

    #[tokio::test]
    async fn mismatched_fallback_is_skipped() {
        let chain = EmbeddingProviderChain::new(vec![
            provider("primary", 768, true, true),
            provider("fallback-384", 384, true, false),
        ]);
        let result = chain.embed(&["hello".to_owned()]).await;
        assert!(result.is_err());

        let status = chain.status().await;
        assert_eq!(status.providers[0].failure, 1);
        assert_eq!(status.providers[1].success, 0);
    }

    #[tokio::test]
    async fn matching_fallback_serves_the_request() {
        let chain = EmbeddingProviderChain::new(vec![
            provider("primary", 768, true, true),
            provider("fallback-768", 768, true, false),
        ]);
        let result = chain.embed(&["hello".to_owned()]).await.expect("embed");
        assert_eq!(result.provider, "fallback-768");
        assert_eq!(result.dimensions, 768);

        let status = chain.status().await;
        assert_eq!(status.active_provider.as_deref(), Some("fallback-768"));
        assert_eq!(status.total_embeds, 2);
    }

    #[tokio::test]
    async fn all_failed_reports_guidance() {
        let chain = EmbeddingProviderChain::new(vec![provider("primary", 768, false, false)]);
        let err = chain.embed(&["hello".to_owned()]).await.err().expect("err");
        assert!(err.to_string().contains("model server"));
    }
}
