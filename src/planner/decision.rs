//! Next-action planning
//!
//! The oracle chooses; [`Planner::vet`] keeps the choice honest. Nothing
//! here touches the browser.

use crate::browser::UrlValidator;
use crate::extraction::ExtractionAction;
use crate::oracle::{ChatMessage, Oracle, ResponseFormat};
use crate::output::truncate_text;
use crate::planner::action::PlannerAction;
use crate::planner::context::Session;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Answer returned when nothing was collected
pub const NO_OUTCOME: &str = "Scraper finished execution without a final outcome.";

const PLANNER_PROMPT: &str = "You are a proactive web-scraping planner. Given the user goal and a context \
summary, choose exactly one action: SEARCH, NAVIGATE, EXTRACT, INTERACT or FINISH.\n\
- SEARCH: run a web search when no unvisited results are available. {\"action\":\"SEARCH\",\"query\":\"...\"}\n\
- NAVIGATE: open the next unvisited search result. {\"action\":\"NAVIGATE\",\"url\":\"...\"}\n\
- EXTRACT: judge the current page without interacting. {\"action\":\"EXTRACT\"}\n\
- INTERACT: operate the listed page_elements (filters, dropdowns, inputs, links) to reveal content. \
{\"action\":\"INTERACT\",\"interactions\":[{\"selector\":\"...\",\"type\":\"click|fill|select|check|uncheck\",\"value\":\"...\"}]}\n\
- FINISH: stop once an extraction is final or has a non-empty output answering the goal. {\"action\":\"FINISH\"}\n\
Guidelines: prefer NAVIGATE while unvisited results exist and the current page has been judged; \
use INTERACT only with selectors from page_elements and only when the current page's extraction \
is incomplete; never invent URLs; if search_loop_detected is true, NAVIGATE. \
Respond with a single JSON object using only the keys action, query, url and interactions.";

const SYNTHESIS_PROMPT: &str = "You are an expert synthesizer. Combine the collected findings into one final \
answer to the user's goal. Answer directly and concisely; do not mention the sources' formatting.";

const RECENT_URLS: usize = 5;
const RESULT_SAMPLE: usize = 5;
const RECENT_EXTRACTIONS: usize = 5;
const SUMMARY_ELEMENTS: usize = 40;
const DIGEST_CHARS: usize = 300;

/// Oracle-driven action selection with guardrails
pub struct Planner {
    oracle: Arc<dyn Oracle>,
    retries: u32,
}

impl Planner {
    /// Planner that retries malformed replies `retries` times
    pub fn new(oracle: Arc<dyn Oracle>, retries: u32) -> Self {
        Self { oracle, retries }
    }

    /// Compact view of the session for the oracle
    pub fn build_summary(session: &Session) -> Value {
        let ctx = &session.context;
        let visited = ctx.visited_urls();
        let recent = &visited[visited.len().saturating_sub(RECENT_URLS)..];

        let pending: Vec<Value> = ctx
            .unvisited_results()
            .map(|r| json!({ "title": r.title, "url": r.url }))
            .collect();
        let sample: Vec<&Value> = pending.iter().take(RESULT_SAMPLE).collect();

        let extractions = ctx.extractions();
        let digests: Vec<Value> = extractions[extractions.len().saturating_sub(RECENT_EXTRACTIONS)..]
            .iter()
            .map(|e| {
                json!({
                    "url": e.url,
                    "action": e.record.action,
                    "summary": truncate_text(&e.record.summary, DIGEST_CHARS),
                    "key_points": e.record.key_points.iter().take(5).collect::<Vec<_>>(),
                    "output": truncate_text(&e.record.output, DIGEST_CHARS),
                })
            })
            .collect();

        let elements: Vec<String> = session
            .page_elements
            .iter()
            .filter(|e| e.visible)
            .take(SUMMARY_ELEMENTS)
            .map(|e| e.describe())
            .collect();

        let mut summary = json!({
            "visited_urls": recent,
            "visited_count": visited.len(),
            "search_queries": ctx.search_queries(),
            "search_results_available": pending.len(),
            "search_results_sample": sample,
            "extracted_count": extractions.len(),
            "extractions": digests,
            "final_candidate_available": ctx.has_final_candidate(),
            "current_url": session.current_url,
            "state": session.state.as_str(),
            "page_elements": elements,
        });
        if ctx.search_queries().len() >= 3 && visited.is_empty() {
            warn!("Search loop detected, recommending NAVIGATE");
            summary["search_loop_detected"] = Value::Bool(true);
        }
        summary
    }

    /// Ask the oracle for the next action; falls back to `Extract`
    #[instrument(skip(self, session), fields(step = session.steps))]
    pub async fn decide_next_action(&self, goal: &str, session: &Session) -> PlannerAction {
        let summary = Self::build_summary(session);
        let summary_text = serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string());
        let messages = [
            ChatMessage::system(PLANNER_PROMPT),
            ChatMessage::user(format!(
                "User goal: {}\n\nContext summary:\n```json\n{}\n```\n\nWhich action and parameters?",
                goal, summary_text
            )),
        ];

        for attempt in 0..=self.retries {
            match self.oracle.complete(&messages, ResponseFormat::Json).await {
                Ok(reply) => match PlannerAction::parse(&reply) {
                    Ok(action) => {
                        info!("Planner chose {}", action);
                        return action;
                    }
                    Err(e) => warn!("Planner reply unusable (attempt {}): {}", attempt + 1, e),
                },
                Err(e) => warn!("Planner call failed (attempt {}): {}", attempt + 1, e),
            }
        }

        warn!("No usable planner reply, defaulting to EXTRACT");
        PlannerAction::Extract
    }

    /// Enforce the rules the oracle is not trusted with
    pub fn vet(&self, action: PlannerAction, session: &Session) -> PlannerAction {
        let ctx = &session.context;
        match action {
            PlannerAction::Finish { .. } if !ctx.has_final_candidate() => {
                let replacement = if ctx.unvisited_results().next().is_some() {
                    PlannerAction::Navigate { url: None }
                } else {
                    PlannerAction::Search { query: None }
                };
                warn!("FINISH rejected without a final extraction, using {}", replacement);
                replacement
            }
            PlannerAction::Navigate { url } => {
                let usable = url.filter(|u| !UrlValidator::is_placeholder(u));
                if usable.is_some() {
                    return PlannerAction::Navigate { url: usable };
                }
                match ctx.unvisited_results().next() {
                    Some(result) => {
                        info!("Substituting unvisited result {}", result.url);
                        PlannerAction::Navigate {
                            url: Some(result.url.clone()),
                        }
                    }
                    None => PlannerAction::Navigate { url: None },
                }
            }
            PlannerAction::Interact { .. } if session.current_url.is_none() => {
                warn!("INTERACT without a page, extracting instead");
                PlannerAction::Extract
            }
            other => other,
        }
    }

    /// Synthesize the answer from what was collected; never fails
    #[instrument(skip(self, session))]
    pub async fn generate_final_answer(&self, goal: &str, session: &Session) -> String {
        let extractions = session.context.extractions();

        let mut findings: Vec<(&str, &str)> = extractions
            .iter()
            .filter(|e| !e.record.output.trim().is_empty())
            .map(|e| (e.url.as_str(), e.record.output.trim()))
            .collect();
        // Final pages first
        findings.sort_by_key(|(url, _)| {
            !extractions
                .iter()
                .any(|e| e.url == *url && e.record.action == ExtractionAction::Final)
        });
        if findings.is_empty() {
            findings = extractions
                .iter()
                .filter(|e| !e.record.summary.trim().is_empty())
                .map(|e| (e.url.as_str(), e.record.summary.trim()))
                .collect();
        }
        if findings.is_empty() {
            warn!("Nothing collected to answer from");
            return NO_OUTCOME.to_string();
        }

        let data: Vec<Value> = findings
            .iter()
            .map(|(url, text)| json!({ "url": url, "finding": text }))
            .collect();
        let data_text = serde_json::to_string_pretty(&data).unwrap_or_default();
        let messages = [
            ChatMessage::system(SYNTHESIS_PROMPT),
            ChatMessage::user(format!("Goal: {}\nData: {}", goal, data_text)),
        ];

        match self.oracle.complete(&messages, ResponseFormat::Text).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                warn!("Empty synthesis, joining findings");
                join_findings(&findings)
            }
            Err(e) => {
                warn!("Synthesis failed, joining findings: {}", e);
                join_findings(&findings)
            }
        }
    }
}

fn join_findings(findings: &[(&str, &str)]) -> String {
    findings
        .iter()
        .map(|(_, text)| *text)
        .collect::<Vec<_>>()
        .join("\n\n")
}
