//! Search engine queries
//!
//! Searches run through the same page the agent browses with: navigate to
//! the engine's result URL, read the rendered markup, and pull out
//! `(title, url)` pairs. Failures never surface as errors; an empty list
//! tells the caller the query is exhausted.

use crate::browser::{PageDriver, UrlValidator};
use crate::error::{Error, Result};
use crate::oracle::{ChatMessage, Oracle, ResponseFormat};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, info, instrument, warn};
use url::Url;

static RESULT_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static RESULT_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3").expect("valid selector"));
static NEXT_PAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a#pnnext[href]").expect("valid selector"));

const REFINE_PROMPT: &str = "You are an expert search query refiner. Your job is to transform a user's raw question \
into a concise and targeted search query that will yield highly relevant results on a web search engine. \
If the input includes any output format instructions (like JSON, CSV, etc.), ignore them. \
Focus on the core information needed. \
Return only the refined search query in plain text with no additional commentary or quotes.";

/// One entry of a result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title as shown by the engine
    pub title: String,
    /// Absolute target URL
    pub url: String,
}

/// Issues queries and walks result pages
pub struct SearchService {
    base_url: String,
    max_results: usize,
    screenshot_dir: Option<PathBuf>,
    next_page: Option<String>,
}

impl SearchService {
    /// Create a service for the given engine endpoint
    pub fn new<S: Into<String>>(base_url: S, max_results: usize) -> Self {
        Self {
            base_url: base_url.into(),
            max_results,
            screenshot_dir: None,
            next_page: None,
        }
    }

    /// Save a screenshot into `dir` whenever a result page yields nothing
    pub fn with_error_screenshots(mut self, dir: PathBuf) -> Self {
        self.screenshot_dir = Some(dir);
        self
    }

    /// Result URL for a query
    pub fn search_url(&self, query: &str) -> Result<String> {
        let url = Url::parse_with_params(&self.base_url, &[("q", query), ("udm", "14")])
            .map_err(|e| Error::config(format!("search url: {}", e)))?;
        Ok(url.into())
    }

    /// Whether the last result page advertised a following page
    pub fn has_next_page(&self) -> bool {
        self.next_page.is_some()
    }

    /// Run a query; empty on any failure
    #[instrument(skip(self, page))]
    pub async fn search(&mut self, page: &dyn PageDriver, query: &str) -> Vec<SearchResult> {
        self.next_page = None;

        let url = match self.search_url(query) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build search URL: {}", e);
                return Vec::new();
            }
        };

        let results = self.load_results(page, &url, query).await;
        info!("Searched for \"{}\": {} results", query, results.len());
        results
    }

    /// Follow the remembered next-page link; empty when there is none
    #[instrument(skip(self, page))]
    pub async fn next_page(&mut self, page: &dyn PageDriver) -> Vec<SearchResult> {
        let Some(url) = self.next_page.take() else {
            debug!("No further result page");
            return Vec::new();
        };

        let results = self.load_results(page, &url, "next page").await;
        info!("Next result page: {} results", results.len());
        results
    }

    async fn load_results(&mut self, page: &dyn PageDriver, url: &str, label: &str) -> Vec<SearchResult> {
        if let Err(e) = page.goto(url).await {
            warn!("Search navigation failed: {}", e);
            self.capture_failure(page, label).await;
            return Vec::new();
        }

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not read search results: {}", e);
                self.capture_failure(page, label).await;
                return Vec::new();
            }
        };

        let current = page.current_url().await;
        let base = if UrlValidator::is_absolute_http(&current) {
            current
        } else {
            url.to_string()
        };

        let (results, next) = parse_results(&html, &base, self.max_results);
        self.next_page = next;

        if results.is_empty() {
            self.capture_failure(page, label).await;
        }
        results
    }

    async fn capture_failure(&self, page: &dyn PageDriver, label: &str) {
        let Some(ref dir) = self.screenshot_dir else {
            return;
        };
        let name: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = dir.join(format!("error_search_{}.png", name));
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Could not create screenshot directory: {}", e);
            return;
        }
        match page.screenshot(&path).await {
            Ok(()) => info!("Saved search error screenshot to {}", path.display()),
            Err(e) => warn!("Could not save error screenshot: {}", e),
        }
    }
}

/// Parse a result page into at most `max` results plus the next-page link
pub fn parse_results(html: &str, base_url: &str, max: usize) -> (Vec<SearchResult>, Option<String>) {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let engine_host = base.as_ref().and_then(|b| b.host_str().map(str::to_ascii_lowercase));

    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for anchor in document.select(&RESULT_ANCHOR) {
        let Some(heading) = anchor.select(&RESULT_TITLE).next() else {
            continue;
        };
        let title = normalize_ws(&heading.text().collect::<String>());
        if title.is_empty() {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_result_url(href, base.as_ref(), engine_host.as_deref()) else {
            continue;
        };
        if seen.insert(url.clone()) {
            results.push(SearchResult { title, url });
        }
        if results.len() >= max {
            break;
        }
    }

    let next = document
        .select(&NEXT_PAGE)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| match &base {
            Some(b) => b.join(href).ok().map(String::from),
            None => Url::parse(href).ok().map(String::from),
        });

    (results, next)
}

/// Absolute target URL for a result href, unwrapping engine redirects
fn resolve_result_url(href: &str, base: Option<&Url>, engine_host: Option<&str>) -> Option<String> {
    let url = match base {
        Some(b) => b.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    let host = url.host_str()?.to_ascii_lowercase();
    let is_engine = engine_host.is_some_and(|e| host == e);

    if is_engine {
        // Engine redirect links: /url?q=<target>
        if url.path() == "/url" {
            let target = url
                .query_pairs()
                .find(|(k, _)| k == "q" || k == "url")
                .map(|(_, v)| v.into_owned())?;
            return UrlValidator::is_absolute_http(&target).then_some(target);
        }
        return None;
    }

    UrlValidator::is_absolute_http(url.as_str()).then(|| url.into())
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrite a user goal into a search-engine-friendly query
#[instrument(skip(oracle))]
pub async fn refine_query(oracle: &dyn Oracle, goal: &str) -> String {
    let messages = [
        ChatMessage::system(REFINE_PROMPT),
        ChatMessage::user(format!("Original query: {}", goal)),
    ];

    match oracle.complete(&messages, ResponseFormat::Text).await {
        Ok(reply) => {
            let refined = reply.trim().trim_matches(|c| c == '"' || c == '\'').trim();
            if refined.is_empty() || refined.lines().count() > 1 {
                warn!("Unusable refined query, keeping the original");
                goal.to_string()
            } else {
                info!("Refined search query: {}", refined);
                refined.to_string()
            }
        }
        Err(e) => {
            warn!("Query refinement failed: {}", e);
            goal.to_string()
        }
    }
}
