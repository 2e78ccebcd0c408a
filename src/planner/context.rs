//! Task context and session state
//!
//! [`Context`] accumulates everything one task learns and only grows.
//! [`Session`] wraps it with the per-iteration state the orchestrator owns.

use crate::extraction::ExtractionRecord;
use crate::interaction::ElementDescriptor;
use crate::planner::PlannerState;
use crate::search::SearchResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// An extraction and the URL it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionEntry {
    /// Page URL
    pub url: String,
    /// The judgement
    pub record: ExtractionRecord,
}

/// Accumulated state of one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    id: Uuid,
    started_at: DateTime<Utc>,
    visited_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    redirect_targets: Vec<String>,
    search_queries: Vec<String>,
    search_results: Vec<SearchResult>,
    extractions: Vec<ExtractionEntry>,
    final_answers: Vec<String>,
    history: Vec<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Empty context stamped with a fresh id
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            visited_urls: Vec::new(),
            redirect_targets: Vec::new(),
            search_queries: Vec::new(),
            search_results: Vec::new(),
            extractions: Vec::new(),
            final_answers: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Task id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Task start time
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Visited URLs in first-visit order
    pub fn visited_urls(&self) -> &[String] {
        &self.visited_urls
    }

    /// Issued queries
    pub fn search_queries(&self) -> &[String] {
        &self.search_queries
    }

    /// Every result seen so far
    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    /// Extractions in order
    pub fn extractions(&self) -> &[ExtractionEntry] {
        &self.extractions
    }

    /// Accepted answers (at most one)
    pub fn final_answers(&self) -> &[String] {
        &self.final_answers
    }

    /// The accepted answer, if any
    pub fn final_answer(&self) -> Option<&str> {
        self.final_answers.first().map(String::as_str)
    }

    /// Log of executed actions
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Record a visit; false when the URL was already visited
    pub fn add_visited_url(&mut self, url: &str) -> bool {
        if self.is_visited(url) {
            return false;
        }
        self.visited_urls.push(url.to_string());
        debug!("Visited {} URLs", self.visited_urls.len());
        true
    }

    /// Whether `url` was visited, directly or as a redirect target
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited_urls.iter().chain(&self.redirect_targets).any(|u| u == url)
    }

    /// Record where a visit landed after redirects; it shares the visit's
    /// budget slot
    pub fn add_redirect(&mut self, landed: &str) -> bool {
        if self.is_visited(landed) {
            return false;
        }
        self.redirect_targets.push(landed.to_string());
        true
    }

    /// Record an issued query
    pub fn add_search_query(&mut self, query: &str) {
        self.search_queries.push(query.to_string());
    }

    /// Add results whose URL is new; returns how many were added
    pub fn merge_search_results(&mut self, results: Vec<SearchResult>) -> usize {
        let before = self.search_results.len();
        for result in results {
            if !self.search_results.iter().any(|r| r.url == result.url) {
                self.search_results.push(result);
            }
        }
        self.search_results.len() - before
    }

    /// Results not visited yet, in result order
    pub fn unvisited_results(&self) -> impl Iterator<Item = &SearchResult> {
        self.search_results.iter().filter(|r| !self.is_visited(&r.url))
    }

    /// Record a page judgement
    pub fn add_extraction(&mut self, url: &str, record: ExtractionRecord) {
        info!("Added extraction for {}", url);
        self.extractions.push(ExtractionEntry {
            url: url.to_string(),
            record,
        });
    }

    /// Most recent judgement of `url`
    pub fn latest_extraction_for(&self, url: &str) -> Option<&ExtractionRecord> {
        self.extractions
            .iter()
            .rev()
            .find(|e| e.url == url)
            .map(|e| &e.record)
    }

    /// Some extraction is final or carries an output
    pub fn has_final_candidate(&self) -> bool {
        self.extractions.iter().any(|e| e.record.is_final_candidate())
    }

    /// Keep `answer` unless one was already accepted
    pub fn accept_final_answer(&mut self, answer: &str) -> bool {
        if !self.final_answers.is_empty() {
            return false;
        }
        self.final_answers.push(answer.to_string());
        true
    }

    /// Append to the action log
    pub fn record<S: Into<String>>(&mut self, entry: S) {
        self.history.push(entry.into());
    }
}

/// Orchestrator-owned state of one run
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Accumulated context
    pub context: Context,
    /// Current planner state
    pub state: PlannerState,
    /// URL of the loaded page
    pub current_url: Option<String>,
    /// Elements of the loaded page
    pub page_elements: Vec<ElementDescriptor>,
    /// Completed iterations
    pub steps: usize,
}

impl Session {
    /// Fresh session
    pub fn new() -> Self {
        Self::default()
    }

    /// A page finished loading
    pub fn set_page(&mut self, url: &str) {
        self.current_url = Some(url.to_string());
        self.page_elements.clear();
        self.state = PlannerState::PageLoaded;
    }

    /// The page is gone (navigation failed)
    pub fn clear_page(&mut self) {
        self.current_url = None;
        self.page_elements.clear();
    }
}
