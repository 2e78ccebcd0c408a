//! Extraction records
//!
//! The oracle's judgement of one page: does it answer the goal, and what
//! did it say. Records always carry the five contract fields even when the
//! reply that produced them was partial or unusable.

use crate::error::OracleError;
use crate::oracle::parse_json_reply;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Whether a page answered the goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionAction {
    /// The page answers the goal
    Final,
    /// Move on to another page
    #[default]
    NextUrl,
}

impl ExtractionAction {
    /// Lenient parse of the oracle's action string
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "final" => Some(Self::Final),
            "next_url" | "next" => Some(Self::NextUrl),
            _ => None,
        }
    }
}

/// Structured judgement of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractionRecord {
    /// final / next_url
    pub action: ExtractionAction,
    /// Short summary of the page's relevance
    pub summary: String,
    /// Key points in page order
    pub key_points: Vec<String>,
    /// Free-form note from the oracle
    pub context: String,
    /// Literal answer text (normally set only when final)
    pub output: String,
    /// Heuristic relevance in `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
    /// URL the record was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    /// Title of that page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
}

impl ExtractionRecord {
    /// The safe default: move on, nothing learned
    pub fn fallback() -> Self {
        Self::default()
    }

    /// Build from a raw oracle reply; `action` is the only required field
    pub fn from_reply(raw: &str) -> Result<Self, OracleError> {
        let value: Value = parse_json_reply(raw)?;

        let action = value
            .get("action")
            .and_then(Value::as_str)
            .and_then(ExtractionAction::parse)
            .ok_or_else(|| OracleError::MalformedReply("missing or unknown 'action'".to_string()))?;

        Ok(Self {
            action,
            summary: text_field(&value, "summary"),
            key_points: list_field(&value, "key_points"),
            context: text_field(&value, "context"),
            output: text_field(&value, "output"),
            ..Self::default()
        })
    }

    /// Whether this record can justify finishing the task
    pub fn is_final_candidate(&self) -> bool {
        self.action == ExtractionAction::Final || !self.output.trim().is_empty()
    }

    /// Attach page metadata and the relevance heuristic
    pub fn scored(mut self, url: &str, title: &str) -> Self {
        self.relevance_score = Some(self.relevance());
        self.page_url = Some(url.to_string());
        self.page_title = Some(title.to_string());
        self
    }

    /// 1.0 when final; more key points raise a summary-only page up to 0.9
    pub fn relevance(&self) -> f32 {
        if self.action == ExtractionAction::Final {
            1.0
        } else if !self.summary.is_empty() && self.key_points.len() > 2 {
            (0.3 + self.key_points.len() as f32 * 0.1).min(0.9)
        } else if !self.summary.is_empty() {
            0.3
        } else {
            0.0
        }
    }

    /// Fold per-chunk records into one; the action is left as `NextUrl`
    /// for the caller to decide
    pub fn merge(parts: &[ExtractionRecord]) -> Self {
        let join = |pick: fn(&ExtractionRecord) -> &str| {
            parts
                .iter()
                .map(pick)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let mut seen = HashSet::new();
        let key_points = parts
            .iter()
            .flat_map(|p| p.key_points.iter())
            .filter(|k| seen.insert(k.trim().to_lowercase()))
            .cloned()
            .collect();

        Self {
            action: ExtractionAction::NextUrl,
            summary: join(|p| p.summary.as_str()),
            key_points,
            context: join(|p| p.context.as_str()),
            output: join(|p| p.output.as_str()),
            ..Self::default()
        }
    }
}

fn text_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

fn list_field(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => s
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
