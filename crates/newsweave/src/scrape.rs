//! The source adapter seam.
//!
//! One [`Scraper`] implementation per upstream. Adapters rate-limit under
//! their own name, run every URL through the guard (via
//! [`crate::http::HttpClient`]), and normalize results into
//! [`Document`](crate::documents::Document)s. "No results" is an empty
//! list, never an error; adapters fail only on transport or configuration
//! problems.

use async_trait::async_trait;

use crate::documents::{Document, SourceKind};
use crate::error::Result;

/// Options shared by every adapter search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Cap on returned documents.
    pub max_results: usize,
    /// BCP-47 language tag, e.g. `zh-TW`.
    pub language: String,
    /// Optional region code, e.g. `TW`.
    pub region: Option<String>,
    /// Forum board to search; ignored by non-forum adapters.
    pub board: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            language: "zh-TW".to_string(),
            region: None,
            board: None,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn with_board(mut self, board: impl Into<String>) -> Self {
        self.board = Some(board.into());
        self
    }
}

/// A single upstream source. Constructed cheaply, used for one search, and
/// dropped.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Stable adapter name; doubles as the rate-limiter key.
    fn name(&self) -> &'static str;

    /// The kind every document from this adapter carries.
    fn source_kind(&self) -> SourceKind;

    /// Search the upstream. Empty result lists are not errors.
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Document>>;
}
