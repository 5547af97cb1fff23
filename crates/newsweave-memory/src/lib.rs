//! # newsweave-memory
//!
//! The personalization and memory engine: per-user profiles, raw feedback,
//! LLM-distilled corrections, and a small knowledge graph, persisted in a
//! dual store.
//!
//! - [`sqlite_store::SqliteStore`] owns the primary records (users,
//!   feedback, corrections, knowledge nodes/edges)
//! - [`vector_store::VectorStore`] owns embeddings for similarity search,
//!   isolated per user via collection-name prefixing
//! - [`manager::MemoryManager`] coordinates both stores and caches
//!   recently-fetched profiles
//! - [`feedback::FeedbackProcessor`] distills raw feedback into
//!   [`models::LearnedCorrection`]s with an LLM
//! - [`personalization::PersonalizationEngine`] composes profile,
//!   corrections, and topic context into prompt sections
//! - [`service::MemoryService`] is the validated facade the rest of the
//!   system talks to

pub mod feedback;
pub mod manager;
pub mod models;
pub mod personalization;
pub mod service;
pub mod sqlite_store;
pub mod vector_store;

pub use manager::MemoryManager;
pub use service::MemoryService;
