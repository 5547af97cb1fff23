//! The shared pipeline state.

use serde::{Deserialize, Serialize};

use newsweave::documents::Document;
use newsweave::graph::MergeableState;

use crate::models::{AnalysisResult, ResearchRequest, VideoBrief};

/// Stage-completion labels; `Error` is the failure terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    QueriesDecomposed,
    NewsScraped,
    SocialScraped,
    AnalysisComplete,
    Complete,
    Error,
}

impl PipelineStep {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::QueriesDecomposed => "queries_decomposed",
            PipelineStep::NewsScraped => "news_scraped",
            PipelineStep::SocialScraped => "social_scraped",
            PipelineStep::AnalysisComplete => "analysis_complete",
            PipelineStep::Complete => "complete",
            PipelineStep::Error => "error",
        }
    }
}

/// Why a run landed on the error node. The display strings are the
/// user-visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFailure {
    NoData,
    DecomposeFailed,
    AnalysisFailed,
    SynthesisFailed,
    Unknown,
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            PipelineFailure::NoData => "no data found; try different keywords",
            PipelineFailure::DecomposeFailed => "query decomposition failed",
            PipelineFailure::AnalysisFailed => "deep analysis failed",
            PipelineFailure::SynthesisFailed => "content synthesis failed",
            PipelineFailure::Unknown => "unknown error",
        };
        f.write_str(message)
    }
}

/// State threaded through the graph. Fields only accumulate: documents and
/// log entries are appended, scalar fields are set by the stage that owns
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    pub request: ResearchRequest,
    pub sub_queries: Vec<String>,
    pub news_results: Vec<Document>,
    pub social_results: Vec<Document>,
    pub forum_results: Vec<Document>,
    pub analysis: Option<AnalysisResult>,
    pub video_brief: Option<VideoBrief>,
    pub error: Option<String>,
    pub current_step: Option<PipelineStep>,
    pub total_sources_scraped: usize,
    pub execution_log: Vec<String>,
}

impl ResearchState {
    #[must_use]
    pub fn new(request: ResearchRequest) -> Self {
        Self {
            request,
            sub_queries: Vec::new(),
            news_results: Vec::new(),
            social_results: Vec::new(),
            forum_results: Vec::new(),
            analysis: None,
            video_brief: None,
            error: None,
            current_step: None,
            total_sources_scraped: 0,
            execution_log: Vec::new(),
        }
    }

    /// Total documents collected across all three result lists.
    #[must_use]
    pub fn total_documents(&self) -> usize {
        self.news_results.len() + self.social_results.len() + self.forum_results.len()
    }

    /// All collected documents in news, social, forum order.
    #[must_use]
    pub fn all_documents(&self) -> Vec<Document> {
        let mut documents =
            Vec::with_capacity(self.total_documents());
        documents.extend(self.news_results.iter().cloned());
        documents.extend(self.social_results.iter().cloned());
        documents.extend(self.forum_results.iter().cloned());
        documents
    }

    pub fn log(&mut self, entry: impl Into<String>) {
        self.execution_log.push(entry.into());
    }

    /// Classify the failure for the error node when the failing stage did
    /// not set a message.
    #[must_use]
    pub fn infer_failure(&self) -> PipelineFailure {
        if self.total_documents() == 0 && !self.sub_queries.is_empty() {
            PipelineFailure::NoData
        } else if self.sub_queries.is_empty() {
            PipelineFailure::DecomposeFailed
        } else if self.analysis.is_none() {
            PipelineFailure::AnalysisFailed
        } else {
            PipelineFailure::Unknown
        }
    }
}

impl MergeableState for ResearchState {
    fn merge(&mut self, other: &Self) {
        self.sub_queries.extend(other.sub_queries.iter().cloned());
        self.news_results.extend(other.news_results.iter().cloned());
        self.social_results
            .extend(other.social_results.iter().cloned());
        self.forum_results
            .extend(other.forum_results.iter().cloned());
        if other.analysis.is_some() {
            self.analysis = other.analysis.clone();
        }
        if other.video_brief.is_some() {
            self.video_brief = other.video_brief.clone();
        }
        if other.error.is_some() {
            self.error = other.error.clone();
        }
        if other.current_step.is_some() {
            self.current_step = other.current_step;
        }
        self.total_sources_scraped += other.total_sources_scraped;
        self.execution_log
            .extend(other.execution_log.iter().cloned());
    }
}
