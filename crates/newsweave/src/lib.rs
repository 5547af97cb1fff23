//! # newsweave
//!
//! Core building blocks for the Newsweave topic-research pipeline:
//!
//! - [`documents::Document`] - the normalized record every upstream source
//!   emits, tagged with a [`documents::SourceKind`]
//! - [`graph::StateGraph`] - a small stateful graph executor with
//!   conditional routing, used to drive the research pipeline
//! - [`llm::ChatModel`] / [`llm::Embeddings`] - provider-agnostic LLM
//!   traits, plus [`llm::chat_structured`] for typed structured output
//! - [`scrape::Scraper`] - the adapter trait implemented by each upstream
//!   integration crate
//! - [`rate_limit::RateLimiter`] - per-key sliding-window admission control
//! - [`url_guard::UrlGuard`] - SSRF defense applied before every outbound
//!   HTTP request
//! - [`http::HttpClient`] - shared HTTP transport with browser headers and
//!   bounded retry
//!
//! Provider integrations (NewsAPI, Google News, PTT, Threads, LinkedIn,
//! OpenAI, Anthropic) live in their own `newsweave-*` crates; the pipeline
//! itself is assembled in `newsweave-research`.

pub mod config;
pub mod constants;
pub mod documents;
pub mod error;
pub mod graph;
pub mod http;
pub mod llm;
pub mod rate_limit;
pub mod scrape;
pub mod testing;
pub mod url_guard;

pub use constants::{DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_REQUEST_TIMEOUT};
pub use documents::{Document, Engagement, SourceKind};
pub use error::{Error, Result};
pub use graph::{CompiledGraph, ExecutionResult, MergeableState, StateGraph, END};
