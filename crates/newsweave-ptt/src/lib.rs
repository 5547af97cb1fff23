//! # newsweave-ptt
//!
//! PTT (批踢踢實業坊) forum adapter, scraping the web frontend at
//! <https://www.ptt.cc>.
//!
//! ## Features
//!
//! - Board article listings with multi-page pagination via the previous-page
//!   anchor (PTT lists newest articles on the index page)
//! - Push-count parsing (`爆` caps at 100, `X…` marks heavily downvoted)
//! - Full article fetch with author/title/time metalines
//! - Hot-article filtering by minimum push count
//! - `search` fetches the latest pages and filters by keyword, because the
//!   site exposes no search API; any whitespace-separated keyword matching
//!   title or body (case-insensitive) counts as a hit
//! - Sends the `over18=1` consent cookie on every request

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use newsweave::documents::{Document, Engagement, SourceKind};
use newsweave::error::{Error, Result};
use newsweave::http::HttpClient;
use newsweave::rate_limit::RateLimiter;
use newsweave::scrape::{Scraper, SearchOptions};

const PTT_WEB_BASE: &str = "https://www.ptt.cc";
const OVER18_COOKIE: &str = "over18=1";

/// Pages fetched per board when emulating search.
const SEARCH_PAGES: usize = 3;

/// Article body length cap.
const MAX_CONTENT_CHARS: usize = 2000;

/// Well-known boards and their display names.
pub const POPULAR_BOARDS: &[(&str, &str)] = &[
    ("Gossiping", "八卦版"),
    ("Stock", "股票版"),
    ("Tech_Job", "科技工作版"),
    ("Movie", "電影版"),
    ("HatePolitics", "政黑版"),
    ("C_Chat", "希洽版"),
    ("Lifeismoney", "省錢版"),
    ("Car", "汽車版"),
];

fn board_name_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    #[allow(clippy::unwrap_used)] // static pattern is always valid
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

#[allow(clippy::unwrap_used)] // static CSS selectors are always valid
fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap()
}

/// A parsed board listing page: entries plus the previous-page link.
struct BoardPage {
    entries: Vec<Document>,
    prev_page: Option<String>,
}

/// PTT forum adapter.
pub struct PttScraper {
    base_url: String,
    client: HttpClient,
}

impl PttScraper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_url: PTT_WEB_BASE.to_string(),
            client: HttpClient::new()?,
        })
    }

    /// Point the adapter at a different host (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn validate_board(board: &str) -> Result<()> {
        if board_name_pattern().is_match(board) {
            Ok(())
        } else {
            Err(Error::InvalidBoardName(board.to_string()))
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        RateLimiter::global().acquire("ptt").await;
        let response = self.client.get_with_cookie(url, OVER18_COOKIE).await?;
        response
            .text()
            .await
            .map_err(|e| Error::adapter_transport(format!("failed to read PTT page: {e}")))
    }

    /// Latest articles from a board, following the previous-page anchor for
    /// up to `pages` pages.
    pub async fn board_articles(&self, board: &str, pages: usize) -> Result<Vec<Document>> {
        Self::validate_board(board)?;

        let mut results = Vec::new();
        let mut url = format!("{}/bbs/{}/index.html", self.base_url, board);

        for _ in 0..pages.max(1) {
            let html = self.fetch(&url).await?;
            let page = parse_board_page(&html, board, &self.base_url);
            results.extend(page.entries);

            match page.prev_page {
                Some(prev) => url = prev,
                None => break,
            }
        }

        Ok(results)
    }

    /// Fetch one article with its metalines and push counts.
    pub async fn article_content(&self, url: &str) -> Result<Option<Document>> {
        let html = self.fetch(url).await?;
        Ok(parse_article_page(&html, url))
    }

    /// Articles with at least `min_pushes` pushes, most pushed first.
    pub async fn hot_articles(
        &self,
        board: &str,
        min_pushes: u64,
        pages: usize,
    ) -> Result<Vec<Document>> {
        let articles = self.board_articles(board, pages).await?;
        let mut hot: Vec<Document> = articles
            .into_iter()
            .filter(|doc| {
                doc.engagement
                    .as_ref()
                    .is_some_and(|e| e.likes >= min_pushes)
            })
            .collect();
        hot.sort_by_key(|doc| {
            std::cmp::Reverse(doc.engagement.as_ref().map_or(0, |e| e.likes))
        });
        Ok(hot)
    }
}

fn parse_push_count(raw: &str) -> i64 {
    match raw.trim() {
        "爆" => 100,
        value if value.starts_with('X') => -10,
        value => value.parse().unwrap_or(0),
    }
}

fn parse_board_page(html: &str, board: &str, base_url: &str) -> BoardPage {
    let document = Html::parse_document(html);
    let entry_selector = selector("div.r-ent");
    let title_selector = selector("div.title a");
    let nrec_selector = selector("div.nrec");
    let author_selector = selector("div.author");
    let date_selector = selector("div.date");
    let paging_selector = selector("a.btn.wide");

    let mut entries = Vec::new();
    for entry in document.select(&entry_selector) {
        // Deleted articles have no title anchor.
        let Some(title_elem) = entry.select(&title_selector).next() else {
            continue;
        };
        let title = title_elem.text().collect::<String>().trim().to_string();
        let Some(href) = title_elem.value().attr("href") else {
            continue;
        };
        let url = resolve_href(base_url, href);
        if url.is_empty() {
            continue;
        }

        let push_count = entry
            .select(&nrec_selector)
            .next()
            .map(|n| parse_push_count(&n.text().collect::<String>()))
            .unwrap_or(0);
        let author = entry
            .select(&author_selector)
            .next()
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|a| !a.is_empty() && a != "-");
        let date = entry
            .select(&date_selector)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let mut doc = Document::new(title, url, SourceKind::Forum, format!("PTT:{board}"))
            .with_region("TW")
            .with_engagement(Engagement {
                likes: push_count.max(0) as u64,
                ..Engagement::default()
            })
            .with_raw(serde_json::json!({ "board": board, "date": date }));
        if let Some(author) = author {
            doc = doc.with_author(author);
        }
        entries.push(doc);
    }

    let prev_page = document
        .select(&paging_selector)
        .find(|a| a.text().collect::<String>().contains("上頁"))
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_href(base_url, href))
        .filter(|href| !href.is_empty());

    BoardPage { entries, prev_page }
}

fn resolve_href(base_url: &str, href: &str) -> String {
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => String::new(),
    }
}

fn parse_article_date(raw: &str) -> Option<DateTime<Utc>> {
    // PTT metaline format: "Mon Jun  2 12:34:56 2025", Taipei time.
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%a %b %e %H:%M:%S %Y").ok()?;
    let taipei = FixedOffset::east_opt(8 * 3600)?;
    taipei
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_article_page(html: &str, url: &str) -> Option<Document> {
    let document = Html::parse_document(html);
    let metaline_selector = selector("div.article-metaline");
    let tag_selector = selector("span.article-meta-tag");
    let value_selector = selector("span.article-meta-value");
    let main_selector = selector("div#main-content");
    let push_selector = selector("div.push");

    let mut author = String::new();
    let mut title = String::new();
    let mut date_str = String::new();

    for metaline in document.select(&metaline_selector) {
        let tag = metaline
            .select(&tag_selector)
            .next()
            .map(|t| t.text().collect::<String>());
        let value = metaline
            .select(&value_selector)
            .next()
            .map(|v| v.text().collect::<String>().trim().to_string());
        if let (Some(tag), Some(value)) = (tag, value) {
            match tag.trim() {
                "作者" => author = value,
                "標題" => title = value,
                "時間" => date_str = value,
                _ => {}
            }
        }
    }

    let main_content = document.select(&main_selector).next()?;
    let full_text = main_content.text().collect::<String>();

    // The body sits between the last metaline and the first push line.
    let mut content_lines = Vec::new();
    let mut in_content = false;
    for line in full_text.lines() {
        if !in_content {
            if line.contains("時間") {
                in_content = true;
            }
            continue;
        }
        if line.starts_with('※') || line.starts_with('→') || line.starts_with('推') {
            break;
        }
        content_lines.push(line);
    }
    let mut content = content_lines.join("\n").trim().to_string();
    if let Some((idx, _)) = content.char_indices().nth(MAX_CONTENT_CHARS) {
        content.truncate(idx);
    }

    let pushes: Vec<String> = document
        .select(&push_selector)
        .map(|p| p.text().collect::<String>())
        .collect();
    let push_count = pushes.iter().filter(|p| p.contains('推')).count() as u64;

    let mut doc = Document::new(title, url, SourceKind::Forum, "PTT")
        .with_content(content)
        .with_region("TW")
        .with_engagement(Engagement {
            likes: push_count,
            comments: pushes.len() as u64,
            ..Engagement::default()
        });
    if !author.is_empty() {
        // Strip the "(nickname)" suffix.
        let name = author.split('(').next().unwrap_or("").trim().to_string();
        if !name.is_empty() {
            doc = doc.with_author(name);
        }
    }
    if let Some(published) = parse_article_date(&date_str) {
        doc = doc.with_published_at(published);
    }
    Some(doc)
}

#[async_trait]
impl Scraper for PttScraper {
    fn name(&self) -> &'static str {
        "ptt"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Forum
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Document>> {
        let board = options.board.as_deref().unwrap_or("Gossiping");
        let articles = self.board_articles(board, SEARCH_PAGES).await?;

        let keywords: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let matched: Vec<Document> = articles
            .into_iter()
            .filter(|doc| {
                let title = doc.title.to_lowercase();
                let content = doc.content.to_lowercase();
                keywords
                    .iter()
                    .any(|kw| title.contains(kw) || content.contains(kw))
            })
            .take(options.max_results)
            .collect();

        debug!(query, board, count = matched.len(), "ptt search finished");
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD_PAGE: &str = r#"<html><body>
    <div class="r-ent">
        <div class="nrec"><span class="hl f2">爆</span></div>
        <div class="title"><a href="/bbs/Stock/M.1717230000.A.123.html">[新聞] AI 概念股大漲</a></div>
        <div class="meta">
            <div class="author">trader01</div>
            <div class="date"> 6/01</div>
        </div>
    </div>
    <div class="r-ent">
        <div class="nrec"><span class="hl f3">X2</span></div>
        <div class="title"><a href="/bbs/Stock/M.1717230001.A.456.html">[請益] 台積電還能買嗎</a></div>
        <div class="meta">
            <div class="author">newbie</div>
            <div class="date"> 6/01</div>
        </div>
    </div>
    <div class="r-ent">
        <div class="title">(本文已被刪除)</div>
    </div>
    <div class="btn-group btn-group-paging">
        <a class="btn wide" href="/bbs/Stock/index7531.html">‹ 上頁</a>
        <a class="btn wide disabled">下頁 ›</a>
    </div>
    </body></html>"#;

    const ARTICLE_PAGE: &str = r#"<html><body><div id="main-content">
    <div class="article-metaline"><span class="article-meta-tag">作者</span><span class="article-meta-value">trader01 (老手)</span></div>
    <div class="article-metaline"><span class="article-meta-tag">標題</span><span class="article-meta-value">[新聞] AI 概念股大漲</span></div>
    <div class="article-metaline"><span class="article-meta-tag">時間</span><span class="article-meta-value">Sun Jun  1 20:15:30 2025</span></div>
今天 AI 概念股全面上漲
市場情緒樂觀
※ 發信站: 批踢踢實業坊(ptt.cc)
<div class="push"><span class="push-tag">推 </span><span class="push-userid">bull</span></div>
<div class="push"><span class="push-tag">→ </span><span class="push-userid">bear</span></div>
</div></body></html>"#;

    #[test]
    fn test_parse_board_page_entries() {
        let page = parse_board_page(BOARD_PAGE, "Stock", PTT_WEB_BASE);
        assert_eq!(page.entries.len(), 2);
        let first = &page.entries[0];
        assert_eq!(first.title, "[新聞] AI 概念股大漲");
        assert_eq!(
            first.url,
            "https://www.ptt.cc/bbs/Stock/M.1717230000.A.123.html"
        );
        assert_eq!(first.source_name, "PTT:Stock");
        assert_eq!(first.source_kind, SourceKind::Forum);
        assert_eq!(first.author.as_deref(), Some("trader01"));
    }

    #[test]
    fn test_parse_board_page_skips_deleted() {
        let page = parse_board_page(BOARD_PAGE, "Stock", PTT_WEB_BASE);
        assert!(page.entries.iter().all(|e| !e.title.contains("刪除")));
    }

    #[test]
    fn test_parse_board_page_prev_link() {
        let page = parse_board_page(BOARD_PAGE, "Stock", PTT_WEB_BASE);
        assert_eq!(
            page.prev_page.as_deref(),
            Some("https://www.ptt.cc/bbs/Stock/index7531.html")
        );
    }

    #[test]
    fn test_parse_board_page_no_prev_link() {
        let html = r#"<html><body><div class="r-ent"></div></body></html>"#;
        let page = parse_board_page(html, "Stock", PTT_WEB_BASE);
        assert!(page.prev_page.is_none());
    }

    #[test]
    fn test_push_count_markers() {
        assert_eq!(parse_push_count("爆"), 100);
        assert_eq!(parse_push_count("X2"), -10);
        assert_eq!(parse_push_count("42"), 42);
        assert_eq!(parse_push_count(""), 0);
        assert_eq!(parse_push_count("--"), 0);
    }

    #[test]
    fn test_explosive_push_maps_to_100_likes() {
        let page = parse_board_page(BOARD_PAGE, "Stock", PTT_WEB_BASE);
        assert_eq!(page.entries[0].engagement.as_ref().unwrap().likes, 100);
        // Downvoted entries clamp to zero rather than going negative.
        assert_eq!(page.entries[1].engagement.as_ref().unwrap().likes, 0);
    }

    #[test]
    fn test_parse_article_page_metalines() {
        let doc = parse_article_page(ARTICLE_PAGE, "https://www.ptt.cc/bbs/Stock/M.1.html")
            .unwrap();
        assert_eq!(doc.title, "[新聞] AI 概念股大漲");
        assert_eq!(doc.author.as_deref(), Some("trader01"));
        assert!(doc.content.contains("AI 概念股全面上漲"));
        assert!(!doc.content.contains("發信站"));
        assert!(doc.published_at.is_some());
    }

    #[test]
    fn test_parse_article_page_push_counts() {
        let doc = parse_article_page(ARTICLE_PAGE, "https://www.ptt.cc/x").unwrap();
        let engagement = doc.engagement.unwrap();
        assert_eq!(engagement.likes, 1);
        assert_eq!(engagement.comments, 2);
    }

    #[test]
    fn test_parse_article_page_without_main_content() {
        assert!(parse_article_page("<html><body></body></html>", "https://x").is_none());
    }

    #[test]
    fn test_parse_article_date_taipei_offset() {
        let parsed = parse_article_date("Sun Jun  1 20:15:30 2025").unwrap();
        // 20:15 Taipei is 12:15 UTC.
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T12:15:30+00:00");
        assert!(parse_article_date("not a date").is_none());
    }

    #[test]
    fn test_board_name_validation() {
        assert!(PttScraper::validate_board("Gossiping").is_ok());
        assert!(PttScraper::validate_board("Tech_Job").is_ok());
        assert!(PttScraper::validate_board("Home-Sale").is_ok());
        assert!(matches!(
            PttScraper::validate_board("../etc").unwrap_err(),
            Error::InvalidBoardName(_)
        ));
        assert!(PttScraper::validate_board("bad board").is_err());
        assert!(PttScraper::validate_board("").is_err());
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_board() {
        let scraper = PttScraper::new().unwrap();
        let options = SearchOptions::default().with_board("no/slash");
        let err = scraper.search("ai", &options).await.unwrap_err();
        assert!(matches!(err, Error::InvalidBoardName(_)));
    }

    #[test]
    fn test_keyword_filter_any_token_matches() {
        // Mirrors the filter inside search(): any whitespace-split token
        // matching the title counts.
        let titles = ["[新聞] AI 概念股大漲", "[閒聊] 今天天氣"];
        let query = "ai 半導體";
        let keywords: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let matched: Vec<&&str> = titles
            .iter()
            .filter(|t| {
                let lower = t.to_lowercase();
                keywords.iter().any(|kw| lower.contains(kw))
            })
            .collect();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn test_popular_boards_table() {
        assert!(POPULAR_BOARDS.iter().any(|(board, _)| *board == "Stock"));
        for (board, _) in POPULAR_BOARDS {
            assert!(PttScraper::validate_board(board).is_ok());
        }
    }
}
