//! Social/forum gathering agent.

use newsweave::documents::Document;

use crate::coordinators::{SocialCoordinator, SocialOutcome};

/// Output of a social gather round.
#[derive(Debug, Default)]
pub struct SocialGatherOutput {
    pub forum_items: Vec<Document>,
    pub social_items: Vec<Document>,
    pub sources_used: Vec<String>,
    pub errors: Vec<String>,
}

impl From<SocialOutcome> for SocialGatherOutput {
    fn from(outcome: SocialOutcome) -> Self {
        Self {
            forum_items: outcome.forum_items,
            social_items: outcome.social_items,
            sources_used: outcome.sources_used,
            errors: outcome.errors,
        }
    }
}

/// Thin agent over the [`SocialCoordinator`]. Platform selection happens
/// upstream: the coordinator is built with exactly the adapters the
/// request enables.
pub struct SocialGatherer {
    coordinator: SocialCoordinator,
}

impl SocialGatherer {
    #[must_use]
    pub fn new(coordinator: SocialCoordinator) -> Self {
        Self { coordinator }
    }

    pub async fn run(
        &self,
        queries: &[String],
        max_results: usize,
        language: &str,
    ) -> SocialGatherOutput {
        self.coordinator
            .gather(queries, max_results, language)
            .await
            .into()
    }
}
