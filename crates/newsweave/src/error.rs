//! Error types shared across the workspace.
//!
//! Every component reports failure through [`Error`]; the variants mirror
//! the error surface of the system (LLM client, source adapters, stores,
//! input validation, graph execution).

use thiserror::Error as ThisError;

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all newsweave components.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The LLM provider could not be reached or returned a non-success
    /// status.
    #[error("LLM transport error: {0}")]
    LlmTransport(String),

    /// The LLM response did not match the requested output schema.
    #[error("LLM schema error: {0}")]
    LlmSchema(String),

    /// A source adapter failed at the HTTP/protocol level.
    #[error("adapter transport error: {0}")]
    AdapterTransport(String),

    /// A source adapter is misconfigured (e.g. missing API key).
    #[error("adapter config error: {0}")]
    AdapterConfig(String),

    /// An outbound URL was rejected by the URL guard. Programmer-facing;
    /// never shown to end users.
    #[error("URL not allowed: {0}")]
    UrlNotAllowed(String),

    /// A user id failed validation.
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// A forum board name failed validation.
    #[error("invalid board name: {0}")]
    InvalidBoardName(String),

    /// A persistence-layer failure (structured or vector store).
    #[error("store error: {0}")]
    Store(String),

    /// Graph construction or execution failure.
    #[error("graph error: {0}")]
    Graph(String),

    /// Invalid input to a component boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn llm_transport(msg: impl Into<String>) -> Self {
        Error::LlmTransport(msg.into())
    }

    pub fn llm_schema(msg: impl Into<String>) -> Self {
        Error::LlmSchema(msg.into())
    }

    pub fn adapter_transport(msg: impl Into<String>) -> Self {
        Error::AdapterTransport(msg.into())
    }

    pub fn adapter_config(msg: impl Into<String>) -> Self {
        Error::AdapterConfig(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Error::Graph(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
