//! Scraper coordination: concurrent fan-out, soft failures, URL
//! deduplication, deterministic ordering.
//!
//! Both coordinators share the same contract: every (query, adapter) pair
//! becomes one task, all tasks run concurrently, a failing task contributes
//! an error string but never cancels its siblings, results are collected in
//! submission order, deduplicated by URL keeping the first occurrence, and
//! sorted newest-first (missing publication dates sort last). Retry is an
//! adapter/transport concern, never re-issued here.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::warn;

use newsweave::documents::{Document, SourceKind};
use newsweave::scrape::{Scraper, SearchOptions};

/// Result of a news gather round.
#[derive(Debug, Default)]
pub struct NewsOutcome {
    pub items: Vec<Document>,
    /// Adapters that produced at least one document.
    pub sources_used: Vec<String>,
    /// One entry per failed task.
    pub errors: Vec<String>,
}

/// Result of a social gather round, partitioned by kind.
#[derive(Debug, Default)]
pub struct SocialOutcome {
    pub forum_items: Vec<Document>,
    pub social_items: Vec<Document>,
    pub sources_used: Vec<String>,
    pub errors: Vec<String>,
}

fn sort_newest_first(items: &mut [Document]) {
    // Missing dates compare as the minimum timestamp.
    items.sort_by_key(|doc| {
        std::cmp::Reverse(doc.published_at.unwrap_or(DateTime::<Utc>::MIN_UTC))
    });
}

fn dedup_by_url(items: Vec<Document>) -> Vec<Document> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|doc| seen.insert(doc.url.clone()))
        .collect()
}

type TaskResult = (String, Result<Vec<Document>, newsweave::error::Error>);

async fn run_task(
    scraper: Arc<dyn Scraper>,
    label: String,
    query: String,
    options: SearchOptions,
) -> TaskResult {
    let result = scraper.search(&query, &options).await;
    (label, result)
}

fn collect_sources(sources_used: &mut Vec<String>, label: &str, produced: usize) {
    if produced > 0 && !sources_used.iter().any(|s| s == label) {
        sources_used.push(label.to_string());
    }
}

/// Fans queries across the news adapters.
pub struct NewsCoordinator {
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl NewsCoordinator {
    #[must_use]
    pub fn new(scrapers: Vec<Arc<dyn Scraper>>) -> Self {
        Self { scrapers }
    }

    /// Run query x adapter tasks concurrently and merge the results.
    pub async fn gather(
        &self,
        queries: &[String],
        max_results: usize,
        language: &str,
    ) -> NewsOutcome {
        let options = SearchOptions::default()
            .with_max_results(max_results)
            .with_language(language);

        let mut tasks = Vec::new();
        for query in queries {
            for scraper in &self.scrapers {
                tasks.push(run_task(
                    Arc::clone(scraper),
                    scraper.name().to_string(),
                    query.clone(),
                    options.clone(),
                ));
            }
        }

        let mut outcome = NewsOutcome::default();
        let mut collected = Vec::new();
        for (label, result) in join_all(tasks).await {
            match result {
                Ok(items) => {
                    collect_sources(&mut outcome.sources_used, &label, items.len());
                    collected.extend(items);
                }
                Err(e) => {
                    warn!(adapter = %label, error = %e, "news task failed");
                    outcome.errors.push(format!("{label}: {e}"));
                }
            }
        }

        let mut items = dedup_by_url(collected);
        sort_newest_first(&mut items);
        outcome.items = items;
        outcome
    }
}

/// Fans queries across forum/social/professional adapters and partitions
/// the output by source kind.
#[derive(Default)]
pub struct SocialCoordinator {
    forum: Option<(Arc<dyn Scraper>, Vec<String>)>,
    social: Option<Arc<dyn Scraper>>,
    professional: Option<(Arc<dyn Scraper>, Vec<String>)>,
}

impl SocialCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the forum adapter over the given boards.
    #[must_use]
    pub fn with_forum(mut self, scraper: Arc<dyn Scraper>, boards: Vec<String>) -> Self {
        self.forum = Some((scraper, boards));
        self
    }

    /// Enable the short-text social adapter.
    #[must_use]
    pub fn with_social(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.social = Some(scraper);
        self
    }

    /// Enable the professional adapter for caller-provided URLs only.
    #[must_use]
    pub fn with_professional(mut self, scraper: Arc<dyn Scraper>, urls: Vec<String>) -> Self {
        self.professional = Some((scraper, urls));
        self
    }

    pub async fn gather(
        &self,
        queries: &[String],
        max_results: usize,
        language: &str,
    ) -> SocialOutcome {
        let base_options = SearchOptions::default()
            .with_max_results(max_results)
            .with_language(language);

        let mut tasks = Vec::new();

        if let Some((scraper, boards)) = &self.forum {
            for query in queries {
                for board in boards {
                    tasks.push(run_task(
                        Arc::clone(scraper),
                        format!("{}:{board}", scraper.name()),
                        query.clone(),
                        base_options.clone().with_board(board.clone()),
                    ));
                }
            }
        }

        if let Some(scraper) = &self.social {
            for query in queries {
                tasks.push(run_task(
                    Arc::clone(scraper),
                    scraper.name().to_string(),
                    query.clone(),
                    base_options.clone(),
                ));
            }
        }

        if let Some((scraper, urls)) = &self.professional {
            for url in urls {
                tasks.push(run_task(
                    Arc::clone(scraper),
                    scraper.name().to_string(),
                    url.clone(),
                    base_options.clone(),
                ));
            }
        }

        let mut outcome = SocialOutcome::default();
        let mut collected = Vec::new();
        for (label, result) in join_all(tasks).await {
            match result {
                Ok(items) => {
                    collect_sources(&mut outcome.sources_used, &label, items.len());
                    collected.extend(items);
                }
                Err(e) => {
                    warn!(adapter = %label, error = %e, "social task failed");
                    outcome.errors.push(format!("{label}: {e}"));
                }
            }
        }

        let (mut forum_items, mut social_items): (Vec<Document>, Vec<Document>) =
            dedup_by_url(collected)
                .into_iter()
                .partition(|doc| doc.source_kind == SourceKind::Forum);
        sort_newest_first(&mut forum_items);
        sort_newest_first(&mut social_items);
        outcome.forum_items = forum_items;
        outcome.social_items = social_items;
        outcome
    }
}
