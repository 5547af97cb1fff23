//! OpenAI chat completions client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use newsweave::constants::{DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_REQUEST_TIMEOUT};
use newsweave::error::{Error, Result};
use newsweave::llm::ChatModel;

use crate::OPENAI_BASE_URL;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Chat-completion client for OpenAI-compatible endpoints.
#[derive(Debug)]
pub struct ChatOpenAi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    json_mode: bool,
}

impl ChatOpenAi {
    /// # Errors
    ///
    /// `Error::AdapterConfig` when the key is empty, `Error::LlmTransport`
    /// when the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::adapter_config(
                "OpenAI API key is required; set OPENAI_API_KEY",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_REQUEST_TIMEOUT)
            .connect_timeout(DEFAULT_HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::llm_transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
            json_mode: true,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Toggle `response_format: json_object`. On by default because every
    /// agent in the pipeline requests structured output.
    #[must_use]
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

#[async_trait]
impl ChatModel for ChatOpenAi {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if self.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::llm_transport(format!("chat completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ApiErrorResponse>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(Error::llm_transport(format!("OpenAI error: {detail}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::llm_transport(format!("invalid chat completion body: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::llm_transport("chat completion contained no choices"))?;

        debug!(model = %self.model, chars = content.len(), "chat completion finished");
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_config_error() {
        let err = ChatOpenAi::new("", "gpt-4o-mini").unwrap_err();
        assert!(matches!(err, Error::AdapterConfig(_)));
    }

    #[test]
    fn test_builder_clamps_temperature() {
        let model = ChatOpenAi::new("sk-test", "gpt-4o-mini")
            .unwrap()
            .with_temperature(7.5);
        assert!((model.temperature - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_floors_max_tokens() {
        let model = ChatOpenAi::new("sk-test", "gpt-4o-mini")
            .unwrap()
            .with_max_tokens(0);
        assert_eq!(model.max_tokens, 1);
    }

    #[test]
    fn test_model_name() {
        let model = ChatOpenAi::new("sk-test", "gpt-4o-mini").unwrap();
        assert_eq!(model.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_response_parsing() {
        let json = serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "{\"a\":1}"}}
            ]
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"a\":1}")
        );
    }

    #[test]
    fn test_error_response_parsing() {
        let json = serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        });
        let parsed: ApiErrorResponse = serde_json::from_value(json).unwrap();
        assert!(parsed.error.message.contains("Incorrect API key"));
    }
}
