//! Graph wiring and the research entry point.
//!
//! Six nodes: `decompose`, `news`, `social`, `analyze`, `synthesize`,
//! `error_handler`. Stage failures are captured into the state (never
//! propagated as node errors) so the conditional edges can route to the
//! error node; a `Result::Err` out of the graph means infrastructure
//! failure, not a failed research run.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use newsweave::documents::SourceKind;
use newsweave::error::Result;
use newsweave::graph::{CompiledGraph, StateGraph, END};
use newsweave::llm::ChatModel;
use newsweave::scrape::Scraper;

use crate::agents::{Analyzer, NewsGatherer, QueryDecomposer, SocialGatherer, Synthesizer};
use crate::coordinators::{NewsCoordinator, SocialCoordinator};
use crate::models::ResearchRequest;
use crate::pipeline::state::{PipelineFailure, PipelineStep, ResearchState};

/// Everything the pipeline needs injected: the chat model and the enabled
/// source adapters.
pub struct PipelineContext {
    llm: Arc<dyn ChatModel>,
    news_scrapers: Vec<Arc<dyn Scraper>>,
    forum_scraper: Option<Arc<dyn Scraper>>,
    forum_boards: Vec<String>,
    social_scraper: Option<Arc<dyn Scraper>>,
    professional_scraper: Option<Arc<dyn Scraper>>,
    professional_urls: Vec<String>,
    target_platforms: Vec<String>,
}

impl PipelineContext {
    #[must_use]
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self {
            llm,
            news_scrapers: Vec::new(),
            forum_scraper: None,
            forum_boards: vec![
                "Gossiping".to_string(),
                "Stock".to_string(),
                "Tech_Job".to_string(),
            ],
            social_scraper: None,
            professional_scraper: None,
            professional_urls: Vec::new(),
            target_platforms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_news_scraper(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.news_scrapers.push(scraper);
        self
    }

    #[must_use]
    pub fn with_forum_scraper(mut self, scraper: Arc<dyn Scraper>, boards: Vec<String>) -> Self {
        self.forum_scraper = Some(scraper);
        if !boards.is_empty() {
            self.forum_boards = boards;
        }
        self
    }

    #[must_use]
    pub fn with_social_scraper(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.social_scraper = Some(scraper);
        self
    }

    /// Professional-network adapter; only runs for caller-provided URLs.
    #[must_use]
    pub fn with_professional_scraper(
        mut self,
        scraper: Arc<dyn Scraper>,
        urls: Vec<String>,
    ) -> Self {
        self.professional_scraper = Some(scraper);
        self.professional_urls = urls;
        self
    }

    /// Restrict platform variants in the brief; empty means all defaults.
    #[must_use]
    pub fn with_target_platforms(mut self, platforms: Vec<String>) -> Self {
        self.target_platforms = platforms;
        self
    }

    fn social_coordinator(&self, request: &ResearchRequest) -> Option<SocialCoordinator> {
        let mut coordinator = SocialCoordinator::new();
        let mut enabled = false;

        if request.sources.contains(&SourceKind::Forum) {
            if let Some(scraper) = &self.forum_scraper {
                coordinator =
                    coordinator.with_forum(Arc::clone(scraper), self.forum_boards.clone());
                enabled = true;
            }
        }
        if request.sources.contains(&SourceKind::Social) {
            if let Some(scraper) = &self.social_scraper {
                coordinator = coordinator.with_social(Arc::clone(scraper));
                enabled = true;
            }
        }
        if !self.professional_urls.is_empty() {
            if let Some(scraper) = &self.professional_scraper {
                coordinator = coordinator
                    .with_professional(Arc::clone(scraper), self.professional_urls.clone());
                enabled = true;
            }
        }

        enabled.then_some(coordinator)
    }
}

fn routes(pairs: &[&str]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|name| (name.to_string(), name.to_string()))
        .collect()
}

/// Assemble the compiled research graph over `context`.
pub fn build_research_graph(
    context: Arc<PipelineContext>,
) -> Result<CompiledGraph<ResearchState>> {
    let mut graph: StateGraph<ResearchState> = StateGraph::new();

    let ctx = Arc::clone(&context);
    graph.add_node_from_fn("decompose", move |mut state: ResearchState| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            let decomposer = QueryDecomposer::new(Arc::clone(&ctx.llm));
            match decomposer.run(&state.request).await {
                Ok(plan) => {
                    state.log(format!(
                        "Decomposed into {} sub-queries: {:?}",
                        plan.sub_queries.len(),
                        plan.sub_queries
                    ));
                    state.sub_queries = plan.sub_queries;
                    state.current_step = Some(PipelineStep::QueriesDecomposed);
                }
                Err(e) => {
                    state.log(format!("Decomposition failed: {e}"));
                    state.error = Some(format!("{}: {e}", PipelineFailure::DecomposeFailed));
                }
            }
            Ok(state)
        })
    });

    let ctx = Arc::clone(&context);
    graph.add_node_from_fn("news", move |mut state: ResearchState| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            if !state.request.sources.contains(&SourceKind::News)
                || ctx.news_scrapers.is_empty()
            {
                state.log("News: skipped (not in selected sources)");
                state.current_step = Some(PipelineStep::NewsScraped);
                return Ok(state);
            }

            let gatherer = NewsGatherer::new(NewsCoordinator::new(ctx.news_scrapers.clone()));
            let output = gatherer
                .run(
                    &state.sub_queries,
                    state.request.max_results_per_source,
                    &state.request.language,
                )
                .await;

            state.log(format!(
                "News: {} items from {:?}",
                output.items.len(),
                output.sources_used
            ));
            for error in &output.errors {
                state.log(format!("News error: {error}"));
            }
            state.total_sources_scraped += output.items.len();
            state.news_results = output.items;
            state.current_step = Some(PipelineStep::NewsScraped);
            Ok(state)
        })
    });

    let ctx = Arc::clone(&context);
    graph.add_node_from_fn("social", move |mut state: ResearchState| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            let Some(coordinator) = ctx.social_coordinator(&state.request) else {
                state.log("Social: skipped (not in selected sources)");
                state.current_step = Some(PipelineStep::SocialScraped);
                return Ok(state);
            };

            let gatherer = SocialGatherer::new(coordinator);
            let output = gatherer
                .run(
                    &state.sub_queries,
                    state.request.max_results_per_source,
                    &state.request.language,
                )
                .await;

            state.log(format!(
                "Social: {} items, Forum: {} items",
                output.social_items.len(),
                output.forum_items.len()
            ));
            for error in &output.errors {
                state.log(format!("Social error: {error}"));
            }
            state.total_sources_scraped +=
                output.social_items.len() + output.forum_items.len();
            state.social_results = output.social_items;
            state.forum_results = output.forum_items;
            state.current_step = Some(PipelineStep::SocialScraped);
            Ok(state)
        })
    });

    let ctx = Arc::clone(&context);
    graph.add_node_from_fn("analyze", move |mut state: ResearchState| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            let analyzer = Analyzer::new(Arc::clone(&ctx.llm));
            let documents = state.all_documents();
            match analyzer
                .run(
                    &state.request.topic,
                    &documents,
                    state.request.depth,
                    &state.request.language,
                )
                .await
            {
                Ok(analysis) => {
                    state.log(format!(
                        "Analysis complete: {} insights, confidence={}",
                        analysis.key_insights.len(),
                        analysis.confidence_score
                    ));
                    state.analysis = Some(analysis);
                    state.current_step = Some(PipelineStep::AnalysisComplete);
                }
                Err(e) => {
                    state.log(format!("Analysis failed: {e}"));
                    state.error = Some(format!("{}: {e}", PipelineFailure::AnalysisFailed));
                }
            }
            Ok(state)
        })
    });

    let ctx = Arc::clone(&context);
    graph.add_node_from_fn("synthesize", move |mut state: ResearchState| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            // Routing guarantees the analysis is present here.
            let Some(analysis) = state.analysis.clone() else {
                state.error = Some(PipelineFailure::AnalysisFailed.to_string());
                return Ok(state);
            };

            let synthesizer = Synthesizer::new(Arc::clone(&ctx.llm));
            let documents = state.all_documents();
            match synthesizer
                .run(
                    &state.request.topic,
                    &analysis,
                    &documents,
                    &ctx.target_platforms,
                    &state.request.tone,
                    &state.request.language,
                )
                .await
            {
                Ok(brief) => {
                    state.log(format!("Synthesis complete: {}", brief.title_suggestion));
                    state.video_brief = Some(brief);
                    state.current_step = Some(PipelineStep::Complete);
                }
                Err(e) => {
                    state.log(format!("Synthesis failed: {e}"));
                    state.error = Some(format!("{}: {e}", PipelineFailure::SynthesisFailed));
                }
            }
            Ok(state)
        })
    });

    graph.add_node_from_fn("error_handler", move |mut state: ResearchState| {
        Box::pin(async move {
            let message = state
                .error
                .clone()
                .unwrap_or_else(|| state.infer_failure().to_string());
            state.error = Some(message.clone());
            state.current_step = Some(PipelineStep::Error);
            state.log(format!("ERROR: {message}"));
            Ok(state)
        })
    });

    graph.set_entry_point("decompose");

    graph.add_conditional_edges(
        "decompose",
        |state: &ResearchState| {
            if state.error.is_some() || state.sub_queries.is_empty() {
                "error_handler".to_string()
            } else {
                "news".to_string()
            }
        },
        routes(&["news", "error_handler"]),
    );

    // An empty news round is not an error; social sources may still hit.
    graph.add_edge("news", "social");

    graph.add_conditional_edges(
        "social",
        |state: &ResearchState| {
            if state.total_documents() == 0 {
                "error_handler".to_string()
            } else {
                "analyze".to_string()
            }
        },
        routes(&["analyze", "error_handler"]),
    );

    graph.add_conditional_edges(
        "analyze",
        |state: &ResearchState| {
            if state.error.is_some() || state.analysis.is_none() {
                "error_handler".to_string()
            } else {
                "synthesize".to_string()
            }
        },
        routes(&["synthesize", "error_handler"]),
    );

    let mut synthesize_routes = routes(&["error_handler"]);
    synthesize_routes.insert("end".to_string(), END.to_string());
    graph.add_conditional_edges(
        "synthesize",
        |state: &ResearchState| {
            if state.error.is_some() {
                "error_handler".to_string()
            } else {
                "end".to_string()
            }
        },
        synthesize_routes,
    );

    graph.add_edge("error_handler", END);

    graph.compile()
}

/// Run one research request through the pipeline. The returned state is
/// terminal: `video_brief` is set iff `current_step == Complete`, otherwise
/// `error` is set and `current_step == Error`.
pub async fn run_research(
    request: ResearchRequest,
    context: Arc<PipelineContext>,
) -> Result<ResearchState> {
    request.validate()?;
    info!(topic = %request.topic, depth = request.depth, "research run starting");

    let graph = build_research_graph(context)?;
    let result = graph.invoke(ResearchState::new(request)).await?;

    info!(
        step = ?result.final_state.current_step,
        documents = result.final_state.total_documents(),
        nodes = ?result.nodes_executed,
        "research run finished"
    );
    Ok(result.final_state)
}
