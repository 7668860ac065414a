//! OpenAI-compatible chat completion client.
//!
//! Works against any `/v1/chat/completions` endpoint, which covers Ollama,
//! LM Studio, and hosted OpenAI-compatible services alike.

use std::time::Duration;

use async_trait::async_trait;
use oakci_domain::error::{Error, Result};
use oakci_domain::ports::LlmClient;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Chat completion client for OpenAI-compatible endpoints.
pub struct OpenAiCompatLlm {
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatLlm {
    /// Create a client for the given endpoint.
    #[must_use]
    pub fn new(
        model: String,
        base_url: String,
        api_key: Option<String>,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            model,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_seconds))
                .build()
                .unwrap_or_default(),
        }
    }

    fn completions_url(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.base_url)
        } else {
            format!("{}/v1/chat/completions", self.base_url)
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatLlm {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut request = self.client.post(self.completions_url()).json(&json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.2,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::network_with_source("LLM request failed", e))?;

        if !response.status().is_success() {
            return Err(Error::llm(format!(
                "LLM endpoint returned status {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("invalid LLM response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::llm("LLM response contained no choices"))
    }
}
