//! # newsweave-linkedin
//!
//! LinkedIn adapter. LinkedIn blocks unauthenticated search, so this
//! adapter only processes caller-provided URLs: the pipeline hands it the
//! post links a user pasted in, and it extracts what the public page
//! exposes.
//!
//! ## Features
//!
//! - Article and feed-post selectors with OpenGraph meta fallbacks
//! - Company-page post extraction
//! - `search` with a non-URL query returns an empty list

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use newsweave::documents::{Document, SourceKind};
use newsweave::error::Result;
use newsweave::http::HttpClient;
use newsweave::rate_limit::RateLimiter;
use newsweave::scrape::{Scraper, SearchOptions};

#[allow(clippy::unwrap_used)] // static CSS selectors are always valid
fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap()
}

/// LinkedIn URL adapter.
pub struct LinkedInScraper {
    client: HttpClient,
}

impl LinkedInScraper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: HttpClient::new()?,
        })
    }

    /// Whether `text` is a LinkedIn URL this adapter can fetch.
    #[must_use]
    pub fn is_linkedin_url(text: &str) -> bool {
        Url::parse(text)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .is_some_and(|host| host == "www.linkedin.com" || host == "linkedin.com")
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        RateLimiter::global().acquire("linkedin").await;
        self.client.get_text(url).await
    }

    /// Fetch one post or article. Returns `None` when the page exposes
    /// nothing usable (most logged-out views).
    pub async fn post(&self, url: &str) -> Result<Option<Document>> {
        match self.fetch(url).await {
            Ok(html) => Ok(parse_post_page(&html, url)),
            Err(e) => {
                debug!(url, error = %e, "linkedin post fetch failed");
                Ok(None)
            }
        }
    }

    /// Posts from a company page; usually only works for public pages.
    pub async fn company_posts(
        &self,
        company_url: &str,
        max_results: usize,
    ) -> Result<Vec<Document>> {
        match self.fetch(company_url).await {
            Ok(html) => Ok(parse_company_page(&html, company_url, max_results)),
            Err(e) => {
                debug!(company_url, error = %e, "linkedin company fetch failed");
                Ok(Vec::new())
            }
        }
    }
}

fn meta_content(document: &Html, property: &'static str) -> Option<String> {
    let css: &'static str = match property {
        "og:title" => r#"meta[property="og:title"]"#,
        "og:description" => r#"meta[property="og:description"]"#,
        "og:image" => r#"meta[property="og:image"]"#,
        _ => return None,
    };
    document
        .select(&selector(css))
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::to_string)
        .filter(|content| !content.is_empty())
}

fn parse_post_page(html: &str, url: &str) -> Option<Document> {
    let document = Html::parse_document(html);

    let mut title = String::new();
    let mut content = String::new();
    let mut author = String::new();

    // Long-form article layout.
    if let Some(article) = document.select(&selector("article")).next() {
        if let Some(h1) = article.select(&selector("h1")).next() {
            title = h1.text().collect::<String>().trim().to_string();
        }
        if let Some(body) = article.select(&selector(".article-content")).next() {
            content = body.text().collect::<String>().trim().to_string();
        }
        if let Some(name) = document.select(&selector(".author-info__name")).next() {
            author = name.text().collect::<String>().trim().to_string();
        }
    }

    // Feed post layout.
    if content.is_empty() {
        if let Some(body) = document
            .select(&selector(".feed-shared-update-v2__description"))
            .next()
        {
            content = body.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                title = truncate_title(&content);
            }
        }
        if let Some(name) = document
            .select(&selector(".update-components-actor__name"))
            .next()
        {
            author = name.text().collect::<String>().trim().to_string();
        }
    }

    // OpenGraph fallbacks when the semantic selectors find nothing.
    if title.is_empty() {
        title = meta_content(&document, "og:title").unwrap_or_default();
    }
    if content.is_empty() {
        content = meta_content(&document, "og:description").unwrap_or_default();
    }
    let image_url = meta_content(&document, "og:image");

    if title.is_empty() && content.is_empty() {
        return None;
    }
    if title.is_empty() {
        title = truncate_title(&content);
    }

    let mut doc = Document::new(title, url, SourceKind::Social, "LinkedIn").with_content(content);
    if !author.is_empty() {
        doc = doc.with_author(author);
    }
    if let Some(image) = image_url {
        doc = doc.with_image_url(image);
    }
    Some(doc)
}

fn parse_company_page(html: &str, url: &str, max_results: usize) -> Vec<Document> {
    let document = Html::parse_document(html);

    let company_name = document
        .select(&selector(".org-top-card-summary__title"))
        .next()
        .map(|name| name.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty());
    let source_name = match &company_name {
        Some(name) => format!("LinkedIn:{name}"),
        None => "LinkedIn".to_string(),
    };

    document
        .select(&selector(".feed-shared-update-v2"))
        .filter_map(|post| {
            let body = post
                .select(&selector(".feed-shared-update-v2__description"))
                .next()?;
            let content = body.text().collect::<String>().trim().to_string();
            if content.is_empty() {
                return None;
            }
            Some(
                Document::new(
                    truncate_title(&content),
                    url,
                    SourceKind::Social,
                    source_name.clone(),
                )
                .with_content(content),
            )
        })
        .take(max_results)
        .collect()
}

fn truncate_title(text: &str) -> String {
    match text.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Scraper for LinkedInScraper {
    fn name(&self) -> &'static str {
        "linkedin"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Social
    }

    async fn search(&self, query: &str, _options: &SearchOptions) -> Result<Vec<Document>> {
        // Unauthenticated keyword search is not available; only URLs work.
        if Self::is_linkedin_url(query) {
            return Ok(self.post(query).await?.into_iter().collect());
        }
        debug!(query, "linkedin search without URL, returning empty");
        Ok(Vec::new())
    }
}
