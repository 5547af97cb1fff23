//! Test doubles shared by the workspace test suites.
//!
//! Kept in the library (not `#[cfg(test)]`) so downstream crates can use
//! them in their own tests without a separate dev-only crate.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::documents::{Document, SourceKind};
use crate::error::{Error, Result};
use crate::llm::{ChatModel, Embeddings};
use crate::scrape::{Scraper, SearchOptions};

enum MockReply {
    Text(String),
    TransportError(String),
}

/// A chat model that replays queued replies and records every prompt.
#[derive(Default)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<String>>,
}

impl MockChatModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a canned text reply.
    #[must_use]
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies
            .lock()
            .push_back(MockReply::Text(reply.into()));
        self
    }

    /// Queue a transport failure.
    #[must_use]
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.replies
            .lock()
            .push_back(MockReply::TransportError(message.into()));
        self
    }

    /// Prompts seen so far, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        match self.replies.lock().pop_front() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::TransportError(message)) => Err(Error::llm_transport(message)),
            None => Err(Error::llm_transport("mock: no queued reply")),
        }
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

/// Deterministic bag-of-words embeddings: each whitespace token hashes to
/// one dimension. Identical texts embed identically and texts sharing
/// tokens correlate, which is all similarity tests need.
pub struct MockEmbeddings {
    dimensions: usize,
}

impl MockEmbeddings {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.to_lowercase().split_whitespace() {
            // FNV-1a
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.as_bytes() {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            let index = (hash % self.dimensions as u64) as usize;
            vector[index] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embeddings for MockEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// A scraper that returns fixed documents or a fixed error.
pub struct MockScraper {
    name: &'static str,
    source_kind: SourceKind,
    documents: Vec<Document>,
    error: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockScraper {
    #[must_use]
    pub fn new(name: &'static str, source_kind: SourceKind) -> Self {
        Self {
            name,
            source_kind,
            documents: Vec::new(),
            error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    /// Make every search fail with an adapter transport error.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Queries this scraper has been asked to run.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Handle for asserting on calls after the scraper moved into a
    /// coordinator.
    #[must_use]
    pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Scraper for MockScraper {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Document>> {
        self.calls.lock().push(query.to_string());
        if let Some(message) = &self.error {
            return Err(Error::adapter_transport(message.clone()));
        }
        Ok(self
            .documents
            .iter()
            .take(options.max_results)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chat_replays_in_order() {
        let model = MockChatModel::new().with_reply("one").with_reply("two");
        assert_eq!(model.generate("a").await.unwrap(), "one");
        assert_eq!(model.generate("b").await.unwrap(), "two");
        assert!(model.generate("c").await.is_err());
        assert_eq!(model.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_mock_chat_error_reply() {
        let model = MockChatModel::new().with_error("boom");
        let err = model.generate("p").await.unwrap_err();
        assert!(matches!(err, Error::LlmTransport(_)));
    }

    #[tokio::test]
    async fn test_mock_embeddings_deterministic() {
        let embeddings = MockEmbeddings::new(64);
        let a = embeddings.embed_query("same text").await.unwrap();
        let b = embeddings.embed_query("same text").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_mock_embeddings_differ_for_different_text() {
        let embeddings = MockEmbeddings::new(64);
        let a = embeddings.embed_query("alpha beta").await.unwrap();
        let b = embeddings.embed_query("gamma delta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_mock_embeddings_unit_norm() {
        let embeddings = MockEmbeddings::new(32);
        let vector = embeddings.embed_query("a b c").await.unwrap();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_mock_scraper_truncates_and_records() {
        let docs = (0..5)
            .map(|i| {
                Document::new(
                    format!("doc {i}"),
                    format!("https://example.com/{i}"),
                    SourceKind::News,
                    "Mock",
                )
            })
            .collect();
        let scraper = MockScraper::new("mock", SourceKind::News).with_documents(docs);
        let options = SearchOptions::default().with_max_results(3);
        let result = scraper.search("query", &options).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(scraper.calls(), vec!["query"]);
    }

    #[tokio::test]
    async fn test_mock_scraper_failing() {
        let scraper = MockScraper::new("mock", SourceKind::News).failing("down");
        let err = scraper
            .search("q", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AdapterTransport(_)));
    }
}
