//! # newsweave-gnews
//!
//! Google News RSS source adapter. No API key required.
//!
//! ## Features
//!
//! - Keyword search via the RSS search feed
//! - Top stories feed for a language/region
//! - Tolerates entries without summaries or publication dates
//! - Source names are namespaced as `GoogleNews:<publisher>`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use newsweave::documents::{Document, SourceKind};
use newsweave::error::{Error, Result};
use newsweave::http::HttpClient;
use newsweave::rate_limit::RateLimiter;
use newsweave::scrape::{Scraper, SearchOptions};

const GOOGLE_NEWS_RSS_BASE: &str = "https://news.google.com/rss";

/// One `<item>` from the feed.
#[derive(Debug, Clone, Default)]
struct FeedEntry {
    title: String,
    link: String,
    description: String,
    pub_date: Option<DateTime<Utc>>,
    source_name: Option<String>,
}

/// Google News RSS adapter.
pub struct GoogleNewsScraper {
    base_url: String,
    client: HttpClient,
}

impl GoogleNewsScraper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_url: GOOGLE_NEWS_RSS_BASE.to_string(),
            client: HttpClient::new()?,
        })
    }

    /// Point the adapter at a different feed root (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn feed_params(language: &str, region: &str) -> String {
        let lang_code = language.split('-').next().unwrap_or(language);
        format!("hl={language}&gl={region}&ceid={region}:{lang_code}")
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>> {
        RateLimiter::global().acquire("google_news").await;
        let xml = self.client.get_text(url).await?;
        parse_feed(&xml)
    }

    /// Front-page top stories for a language/region.
    pub async fn top_stories(
        &self,
        language: &str,
        region: &str,
        max_results: usize,
    ) -> Result<Vec<Document>> {
        let url = format!(
            "{}?{}",
            self.base_url,
            Self::feed_params(language, region)
        );
        let entries = self.fetch_feed(&url).await?;
        Ok(entries_to_documents(entries, max_results, language))
    }
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an RSS 2.0 feed with quick-xml events. Only the fields the
/// document model needs are read.
fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut in_source = false;
    let mut text_buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    current = Some(FeedEntry::default());
                } else if name == "source" && current.is_some() {
                    in_source = true;
                }
                text_buffer.clear();
            }
            Ok(Event::Text(e)) => {
                text_buffer = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::CData(e)) => {
                text_buffer = String::from_utf8_lossy(&e.into_inner()).to_string();
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                } else if let Some(entry) = current.as_mut() {
                    match name.as_str() {
                        "title" => entry.title = text_buffer.clone(),
                        "link" => entry.link = text_buffer.clone(),
                        "description" => entry.description = text_buffer.clone(),
                        "pubDate" => entry.pub_date = parse_pub_date(&text_buffer),
                        "source" => {
                            if in_source && !text_buffer.is_empty() {
                                entry.source_name = Some(text_buffer.clone());
                            }
                            in_source = false;
                        }
                        _ => {}
                    }
                }
                text_buffer.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::adapter_transport(format!(
                    "RSS parsing error: {e}"
                )))
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn entries_to_documents(
    entries: Vec<FeedEntry>,
    max_results: usize,
    language: &str,
) -> Vec<Document> {
    entries
        .into_iter()
        .filter(|entry| !entry.link.is_empty())
        .take(max_results)
        .map(|entry| {
            let source = entry
                .source_name
                .unwrap_or_else(|| "Unknown".to_string());
            let mut document = Document::new(
                entry.title,
                entry.link,
                SourceKind::News,
                format!("GoogleNews:{source}"),
            )
            .with_content(entry.description)
            .with_language(language);
            if let Some(pub_date) = entry.pub_date {
                document = document.with_published_at(pub_date);
            }
            document
        })
        .collect()
}

#[async_trait]
impl Scraper for GoogleNewsScraper {
    fn name(&self) -> &'static str {
        "google_news"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Document>> {
        let region = options.region.as_deref().unwrap_or("TW");
        let url = format!(
            "{}/search?q={}&{}",
            self.base_url,
            urlencoding::encode(query),
            Self::feed_params(&options.language, region)
        );

        let entries = self.fetch_feed(&url).await?;
        let documents = entries_to_documents(entries, options.max_results, &options.language);
        debug!(query, count = documents.len(), "google news search finished");
        Ok(documents)
    }
}
