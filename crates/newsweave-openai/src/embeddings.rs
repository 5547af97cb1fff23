//! OpenAI embeddings client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use newsweave::constants::{DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_REQUEST_TIMEOUT};
use newsweave::error::{Error, Result};
use newsweave::llm::Embeddings;

use crate::OPENAI_BASE_URL;

/// Texts per embeddings request; the API accepts up to 2048.
const DEFAULT_CHUNK_SIZE: usize = 512;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Embeddings client for OpenAI-compatible endpoints.
#[derive(Debug)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    chunk_size: usize,
}

impl OpenAiEmbeddings {
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
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({"model": self.model, "input": texts}))
            .send()
            .await
            .map_err(|e| Error::llm_transport(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::llm_transport(format!(
                "embeddings endpoint returned HTTP {status}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::llm_transport(format!("invalid embeddings body: {e}")))?;

        if body.data.len() != texts.len() {
            return Err(Error::llm_transport(format!(
                "embeddings count mismatch: sent {}, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::llm_transport("embeddings response was empty"))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.chunk_size) {
            vectors.extend(self.embed_batch(chunk).await?);
        }
        Ok(vectors)
    }
}
