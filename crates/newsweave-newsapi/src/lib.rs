//! # newsweave-newsapi
//!
//! NewsAPI (<https://newsapi.org>) source adapter.
//!
//! ## Features
//!
//! - `everything` keyword search and `top-headlines` by country/category
//! - Requires an API key (`NEWSAPI_KEY`); construction fails without one so
//!   callers can degrade to RSS-only gathering
//! - Skips articles redacted to `[Removed]` by the upstream
//! - Parses ISO-8601 publication timestamps
//! - Source names are namespaced as `NewsAPI:<origin>`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use newsweave::documents::{Document, SourceKind};
use newsweave::error::{Error, Result};
use newsweave::http::HttpClient;
use newsweave::rate_limit::RateLimiter;
use newsweave::scrape::{Scraper, SearchOptions};

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";

/// NewsAPI caps `pageSize` at 100 on every plan.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default, rename = "urlToImage")]
    url_to_image: Option<String>,
    #[serde(default)]
    source: NewsApiSource,
}

#[derive(Debug, Default, Deserialize)]
struct NewsApiSource {
    #[serde(default)]
    name: Option<String>,
}

/// NewsAPI adapter. Cheap to construct; dropped after one search.
#[derive(Debug)]
pub struct NewsApiScraper {
    api_key: String,
    base_url: String,
    client: HttpClient,
}

impl NewsApiScraper {
    /// Create an adapter with an explicit API key.
    ///
    /// # Errors
    ///
    /// `Error::AdapterConfig` when the key is empty, `Error::AdapterTransport`
    /// when the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::adapter_config(
                "NewsAPI key is required; set NEWSAPI_KEY",
            ));
        }
        Ok(Self {
            api_key,
            base_url: NEWSAPI_BASE_URL.to_string(),
            client: HttpClient::new()?,
        })
    }

    /// Point the adapter at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(&self, url: &str) -> Result<NewsApiResponse> {
        RateLimiter::global().acquire("newsapi").await;

        let response = self
            .client
            .get_with_headers(url, &[("X-Api-Key", self.api_key.as_str())])
            .await?;
        let body: NewsApiResponse = response
            .json()
            .await
            .map_err(|e| Error::adapter_transport(format!("invalid NewsAPI response: {e}")))?;

        if body.status != "ok" {
            let message = body.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(Error::adapter_transport(format!("NewsAPI error: {message}")));
        }

        Ok(body)
    }

    /// Top headlines for a country, optionally restricted to a category.
    pub async fn top_headlines(
        &self,
        country: &str,
        category: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<Document>> {
        let mut url = format!(
            "{}/top-headlines?country={}&pageSize={}",
            self.base_url,
            urlencoding::encode(country),
            max_results.min(MAX_PAGE_SIZE)
        );
        if let Some(category) = category {
            url.push_str(&format!("&category={}", urlencoding::encode(category)));
        }

        let body = self.fetch(&url).await?;
        Ok(parse_articles(body.articles))
    }
}

fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_articles(articles: Vec<NewsApiArticle>) -> Vec<Document> {
    let mut documents = Vec::new();

    for article in articles {
        let title = article.title.unwrap_or_default();
        // Upstream replaces withdrawn articles with a "[Removed]" stub.
        if title == "[Removed]" {
            continue;
        }
        let Some(url) = article.url.filter(|url| !url.is_empty()) else {
            continue;
        };

        let content = article
            .description
            .clone()
            .or(article.content.clone())
            .unwrap_or_default();
        let origin = article
            .source
            .name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());

        let mut document = Document::new(title, url, SourceKind::News, format!("NewsAPI:{origin}"))
            .with_content(content);
        if let Some(author) = article.author.clone().filter(|a| !a.is_empty()) {
            document = document.with_author(author);
        }
        if let Some(published) = article.published_at.as_deref().and_then(parse_published_at) {
            document = document.with_published_at(published);
        }
        if let Some(image) = article.url_to_image.clone().filter(|u| !u.is_empty()) {
            document = document.with_image_url(image);
        }

        documents.push(document);
    }

    documents
}

#[async_trait]
impl Scraper for NewsApiScraper {
    fn name(&self) -> &'static str {
        "newsapi"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Document>> {
        // NewsAPI wants a bare language code ("zh-TW" -> "zh").
        let language = options
            .language
            .split('-')
            .next()
            .unwrap_or(&options.language);

        let url = format!(
            "{}/everything?q={}&language={}&sortBy=publishedAt&pageSize={}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(language),
            options.max_results.min(MAX_PAGE_SIZE)
        );

        let body = self.fetch(&url).await?;
        let documents = parse_articles(body.articles);
        debug!(query, count = documents.len(), "newsapi search finished");
        Ok(documents)
    }
}
