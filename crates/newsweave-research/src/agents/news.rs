//! News gathering agent.

use crate::coordinators::{NewsCoordinator, NewsOutcome};

/// Output of a news gather round, shaped for the pipeline node.
#[derive(Debug, Default)]
pub struct NewsGatherOutput {
    pub items: Vec<newsweave::documents::Document>,
    pub sources_used: Vec<String>,
    pub errors: Vec<String>,
}

impl From<NewsOutcome> for NewsGatherOutput {
    fn from(outcome: NewsOutcome) -> Self {
        Self {
            items: outcome.items,
            sources_used: outcome.sources_used,
            errors: outcome.errors,
        }
    }
}

/// Thin agent over the [`NewsCoordinator`]; whether to run at all is the
/// pipeline node's decision (requests may exclude news entirely).
pub struct NewsGatherer {
    coordinator: NewsCoordinator,
}

impl NewsGatherer {
    #[must_use]
    pub fn new(coordinator: NewsCoordinator) -> Self {
        Self { coordinator }
    }

    pub async fn run(
        &self,
        queries: &[String],
        max_results: usize,
        language: &str,
    ) -> NewsGatherOutput {
        self.coordinator
            .gather(queries, max_results, language)
            .await
            .into()
    }
}
