//! # newsweave-anthropic
//!
//! Anthropic messages API backend for [`newsweave::llm::ChatModel`]. Used
//! as the secondary chat provider; embeddings stay on the primary provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use newsweave::constants::{DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_REQUEST_TIMEOUT};
use newsweave::error::{Error, Result};
use newsweave::llm::ChatModel;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Chat client for the Anthropic messages API.
#[derive(Debug)]
pub struct ChatAnthropic {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl ChatAnthropic {
    /// # Errors
    ///
    /// `Error::AdapterConfig` when the key is empty, `Error::LlmTransport`
    /// when the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::adapter_config(
                "Anthropic API key is required; set ANTHROPIC_API_KEY",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_REQUEST_TIMEOUT)
            .connect_timeout(DEFAULT_HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::llm_transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        // The messages API caps temperature at 1.
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }
}

#[async_trait]
impl ChatModel for ChatAnthropic {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::llm_transport(format!("messages request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::llm_transport(format!(
                "Anthropic error: HTTP {status}: {detail}"
            )));
        }

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::llm_transport(format!("invalid messages body: {e}")))?;

        let text = message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(Error::llm_transport("messages response had no text blocks"));
        }

        debug!(model = %self.model, chars = text.len(), "messages call finished");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
