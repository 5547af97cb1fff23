//! # newsweave-research
//!
//! The topic-research pipeline: a free-text topic goes in, a structured
//! short-form video brief comes out.
//!
//! Stages, wired as a [`newsweave::graph::StateGraph`]:
//!
//! ```text
//! decompose -> news -> social -> analyze -> synthesize -> END
//!      \________________\____________\__________\
//!                                        error_handler -> END
//! ```
//!
//! - [`agents::QueryDecomposer`] splits the topic into sub-queries
//! - [`agents::NewsGatherer`] / [`agents::SocialGatherer`] fan those
//!   queries across the source adapters through the coordinators
//! - [`agents::Analyzer`] condenses the corpus and asks the LLM for
//!   structured insights
//! - [`agents::Synthesizer`] turns the analysis into a [`models::VideoBrief`]
//!
//! Entry point: [`pipeline::run_research`].

pub mod agents;
pub mod coordinators;
pub mod factory;
pub mod models;
pub mod pipeline;

pub use models::{AnalysisResult, ResearchRequest, SubQueryPlan, VideoBrief};
pub use pipeline::{run_research, PipelineContext, ResearchState};
