//! Summarization LLM clients.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatLlm;

use std::sync::Arc;

use oakci_domain::ports::LlmClient;
use oakci_domain::value_objects::SummarizationConfig;

/// Builds the summarizer client from configuration, or `None` when
/// summarization is disabled.
#[must_use]
pub fn create_llm(config: &SummarizationConfig) -> Option<Arc<dyn LlmClient>> {
    if !config.enabled {
        return None;
    }
    Some(Arc::new(OpenAiCompatLlm::new(
        config.model.clone(),
        config.base_url.clone(),
        config.api_key.clone(),
        config.timeout_seconds,
    )))
}
