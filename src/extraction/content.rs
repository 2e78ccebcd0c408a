//! Page content judgement
//!
//! Turns the current page (HTML or PDF) into markdown-ish text, asks the
//! oracle whether it answers the goal, and folds the reply into an
//! [`ExtractionRecord`]. Long pages are judged chunk by chunk and merged.

use crate::browser::PageDriver;
use crate::error::{ExtractionError, Result};
use crate::extraction::pdf;
use crate::extraction::record::{ExtractionAction, ExtractionRecord};
use crate::oracle::{parse_json_reply, ChatMessage, Oracle, ResponseFormat};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const EXTRACT_PROMPT: &str = "You are analyzing a web page to extract relevant information. \
Based on the content, determine whether it answers the user's question. \
If it does, create a summary, extract key points and put the literal answer in \"output\". \
Respond with a single JSON object: \
{\"action\": \"final\" | \"next_url\", \"summary\": string, \"key_points\": [string], \
\"context\": string, \"output\": string}. \
Use \"final\" only when the content answers the question; otherwise use \"next_url\" and leave \"output\" empty.";

const DECIDE_PROMPT: &str = "You are given notes gathered from consecutive parts of one web page. \
Decide whether, taken together, they answer the user's question. \
Respond with a single JSON object: {\"action\": \"final\" | \"next_url\"}.";

/// Elements whose text is never content
const STRIPPED_TAGS: [&str; 6] = ["head", "script", "style", "noscript", "svg", "template"];

static STRIP_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    STRIPPED_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("valid regex")
        })
        .collect()
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static HEADING_RES: LazyLock<Vec<(usize, Regex)>> = LazyLock::new(|| {
    (1..=6)
        .rev()
        .map(|i| {
            let re = Regex::new(&format!(r"(?is)<h{i}\b[^>]*>(.*?)</h{i}\s*>")).expect("valid regex");
            (i, re)
        })
        .collect()
});
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>").expect("valid regex"));
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:b|strong)\b[^>]*>(.*?)</(?:b|strong)\s*>").expect("valid regex")
});
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:i|em)\b[^>]*>(.*?)</(?:i|em)\s*>").expect("valid regex")
});
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a\s*>"#).expect("valid regex")
});
static PRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre\b[^>]*>(.*?)</pre\s*>").expect("valid regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<code\b[^>]*>(.*?)</code\s*>").expect("valid regex"));
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li\s*>").expect("valid regex"));
static BLOCK_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(?:p|div|section|article|tr|table|ul|ol|li|h[1-6])\s*>").expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static INLINE_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\f\v]+").expect("valid regex"));
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

#[derive(Deserialize)]
struct Decision {
    action: String,
}

/// Oracle-backed page judge
pub struct ContentExtractor {
    oracle: Arc<dyn Oracle>,
    http: reqwest::Client,
    chunk_chars: usize,
    target_selector: Option<String>,
}

impl ContentExtractor {
    /// Create an extractor that chunks content above `chunk_chars`
    pub fn new(oracle: Arc<dyn Oracle>, chunk_chars: usize) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            oracle,
            http,
            chunk_chars: chunk_chars.max(1),
            target_selector: None,
        }
    }

    /// Prefer this container when reading HTML
    pub fn with_target_selector(mut self, selector: Option<String>) -> Self {
        self.target_selector = selector.filter(|s| !s.trim().is_empty());
        self
    }

    /// Judge the current page against `goal`; never fails
    #[instrument(skip(self, page))]
    pub async fn extract(&self, page: &dyn PageDriver, goal: &str) -> ExtractionRecord {
        let url = page.current_url().await;
        let title = page.title().await.unwrap_or_default();

        let text = match self.page_text(page, &url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not read page content: {}", e);
                return ExtractionRecord::fallback().scored(&url, &title);
            }
        };
        if text.trim().is_empty() {
            warn!("Page at {} has no readable content", url);
            return ExtractionRecord::fallback().scored(&url, &title);
        }

        let record = if text.chars().count() > self.chunk_chars {
            self.judge_chunked(&text, &url, &title, goal).await
        } else {
            self.judge(&text, &url, &title, goal).await.unwrap_or_else(|e| {
                warn!("Extraction reply unusable: {}", e);
                ExtractionRecord::fallback()
            })
        };

        let record = record.scored(&url, &title);
        info!(
            "Extracted {} -> {:?} ({} key points)",
            url,
            record.action,
            record.key_points.len()
        );
        record
    }

    /// Normalized text of the loaded page (PDF or HTML)
    pub async fn page_text(&self, page: &dyn PageDriver, url: &str) -> Result<String> {
        if pdf::is_pdf(page, url).await {
            info!("Detected PDF at {}", url);
            return pdf::pdf_text(page, &self.http, url).await;
        }

        let html = page.content().await?;
        let scope = self
            .target_selector
            .as_deref()
            .and_then(|sel| select_container(&html, sel));
        match scope {
            Some(inner) => Ok(html_to_markdown(&inner)),
            None => {
                debug!("No target container, using the whole page");
                Ok(html_to_markdown(&html))
            }
        }
    }

    async fn judge(&self, text: &str, url: &str, title: &str, goal: &str) -> Result<ExtractionRecord> {
        let messages = [
            ChatMessage::system(EXTRACT_PROMPT),
            ChatMessage::user(format!(
                "Question: {}\n\nURL: {}\nTITLE: {}\n\nCONTENT:\n{}",
                goal, url, title, text
            )),
        ];
        let reply = self.oracle.complete(&messages, ResponseFormat::Json).await?;
        Ok(ExtractionRecord::from_reply(&reply)?)
    }

    async fn judge_chunked(&self, text: &str, url: &str, title: &str, goal: &str) -> ExtractionRecord {
        let chunks = chunk_text(text, self.chunk_chars);
        info!("Judging {} chunks of {}", chunks.len(), url);

        let mut parts = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            match self.judge(chunk, url, title, goal).await {
                Ok(part) => parts.push(part),
                Err(e) => {
                    warn!("Chunk {} of {} unusable: {}", i + 1, chunks.len(), e);
                    parts.push(ExtractionRecord::fallback());
                }
            }
        }

        let mut merged = ExtractionRecord::merge(&parts);
        merged.action = match self.decide(&merged, goal).await {
            Ok(action) => action,
            Err(e) => {
                warn!("Merged decision failed: {}", e);
                ExtractionAction::NextUrl
            }
        };
        merged
    }

    async fn decide(&self, merged: &ExtractionRecord, goal: &str) -> Result<ExtractionAction> {
        let key_points = merged
            .key_points
            .iter()
            .map(|k| format!("- {}", k))
            .collect::<Vec<_>>()
            .join("\n");
        let messages = [
            ChatMessage::system(DECIDE_PROMPT),
            ChatMessage::user(format!(
                "Question: {}\n\nSummary:\n{}\n\nKey points:\n{}\n\nCandidate answer:\n{}",
                goal, merged.summary, key_points, merged.output
            )),
        ];
        let reply = self.oracle.complete(&messages, ResponseFormat::Json).await?;
        let decision: Decision = parse_json_reply(&reply)?;
        ExtractionAction::parse(&decision.action).ok_or_else(|| {
            ExtractionError::ParsingFailed(format!("unknown action '{}'", decision.action)).into()
        })
    }
}

/// Inner markup of the first element matching `selector`, if it has text
pub fn select_container(html: &str, selector: &str) -> Option<String> {
    let selector = match Selector::parse(selector) {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid target selector '{}': {:?}", selector, e);
            return None;
        }
    };
    let document = Html::parse_document(html);
    let element = document.select(&selector).next()?;
    let has_text = element.text().any(|t| !t.trim().is_empty());
    has_text.then(|| element.inner_html())
}

/// Convert HTML to markdown
pub fn html_to_markdown(html: &str) -> String {
    let mut md = strip_non_content(html);

    for (level, re) in HEADING_RES.iter() {
        let prefix = "#".repeat(*level);
        md = re.replace_all(&md, format!("\n\n{} $1\n\n", prefix)).into_owned();
    }
    md = PRE_RE.replace_all(&md, "\n```\n$1\n```\n").into_owned();
    md = CODE_RE.replace_all(&md, "`$1`").into_owned();
    md = BOLD_RE.replace_all(&md, "**$1**").into_owned();
    md = ITALIC_RE.replace_all(&md, "*$1*").into_owned();
    md = LINK_RE.replace_all(&md, "[$2]($1)").into_owned();
    md = LIST_ITEM_RE.replace_all(&md, "\n- $1\n").into_owned();
    md = PARAGRAPH_RE.replace_all(&md, "$1\n\n").into_owned();
    md = BR_RE.replace_all(&md, "\n").into_owned();
    md = BLOCK_END_RE.replace_all(&md, "\n").into_owned();
    md = TAG_RE.replace_all(&md, "").into_owned();

    normalize_whitespace(&decode_entities(&md))
}

fn strip_non_content(html: &str) -> String {
    let mut out = COMMENT_RE.replace_all(html, "").into_owned();
    for re in STRIP_RES.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    out
}

fn decode_entities(text: &str) -> String {
    htmlescape::decode_html(text).unwrap_or_else(|_| {
        text.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    })
}

fn normalize_whitespace(text: &str) -> String {
    let text = text.replace('\u{a0}', " ");
    let text = INLINE_WS_RE.replace_all(&text, " ");
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let text = lines.join("\n");
    BLANK_LINES_RE.replace_all(&text, "\n\n").trim().to_string()
}

/// Split `text` into pieces of at most `max` chars, preferring paragraph
/// breaks, then any whitespace
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.chars().count() <= max {
            chunks.push(rest.to_string());
            break;
        }

        // Byte offset of the char limit
        let limit = rest.char_indices().nth(max).map(|(i, _)| i).unwrap_or(rest.len());
        let window = &rest[..limit];
        let cut = window
            .rfind("\n\n")
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        let (head, tail) = rest.split_at(cut);
        let head = head.trim();
        if !head.is_empty() {
            chunks.push(head.to_string());
        }
        rest = tail.trim_start();
    }

    chunks
}
