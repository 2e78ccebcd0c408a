//! Run artifacts
//!
//! The answer, a readable context summary and a JSON dump of the context,
//! written under one directory and overwritten on every run.

use crate::error::Result;
use crate::planner::Context;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

/// Final answer file
pub const FINAL_OUTPUT_FILE: &str = "final_output.txt";
/// Markdown context summary file
pub const CONTEXT_SUMMARY_FILE: &str = "context_summary.md";
/// JSON context dump file
pub const CONTEXT_JSON_FILE: &str = "context.json";

/// Writes artifacts into a directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// Writer for `dir` (created on first write)
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one file, replacing any previous content
    pub async fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, content).await?;
        info!("Output saved to {}", path.display());
        Ok(path)
    }

    /// Write the answer and context files; failures are logged and skipped
    #[instrument(skip(self, answer, context), fields(dir = %self.dir.display()))]
    pub async fn save_run(&self, answer: &str, context: &Context) -> Vec<PathBuf> {
        let json = match serde_json::to_string_pretty(context) {
            Ok(json) => Some(json),
            Err(e) => {
                error!("Could not serialize context: {}", e);
                None
            }
        };

        let mut files = vec![
            (FINAL_OUTPUT_FILE, answer.to_string()),
            (CONTEXT_SUMMARY_FILE, render_context_markdown(context)),
        ];
        if let Some(json) = json {
            files.push((CONTEXT_JSON_FILE, json));
        }

        let mut written = Vec::new();
        for (name, content) in files {
            match self.write(name, &content).await {
                Ok(path) => written.push(path),
                Err(e) => error!("Error saving {}: {}", name, e),
            }
        }
        written
    }
}

/// Human-readable summary of a context
pub fn render_context_markdown(context: &Context) -> String {
    let mut out = vec!["# Web Scraping Context Summary".to_string(), String::new()];

    out.push("## Visited URLs".to_string());
    for (i, url) in context.visited_urls().iter().enumerate() {
        out.push(format!("{}. {}", i + 1, url));
    }
    out.push(String::new());

    out.push("## Search Queries".to_string());
    for (i, query) in context.search_queries().iter().enumerate() {
        out.push(format!("{}. {}", i + 1, query));
    }
    out.push(String::new());

    out.push("## Extracted Content".to_string());
    for (i, entry) in context.extractions().iter().enumerate() {
        out.push(format!("### Source {}: {}", i + 1, entry.url));
        if entry.record.summary.trim().is_empty() {
            out.push("No summary available".to_string());
        } else {
            out.push(truncate_text(entry.record.summary.trim(), 1000));
        }
        if !entry.record.key_points.is_empty() {
            out.push("\nKey points:".to_string());
            for point in &entry.record.key_points {
                out.push(format!("- {}", point));
            }
        }
        out.push(String::new());
    }

    if let Some(answer) = context.final_answer() {
        out.push("## Final Answer".to_string());
        out.push(answer.to_string());
    }

    out.join("\n")
}

/// Cut `text` to `max` chars, at a sentence end when one is close
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max).collect();
    let period = truncated.rfind('.').map(|byte| (byte, truncated[..byte].chars().count()));

    match period {
        Some((byte, chars)) if chars as f64 > max as f64 * 0.7 => {
            format!("{} [...]", &truncated[..=byte])
        }
        _ => format!("{} [...]", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionRecord;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("", 10), "");
        assert_eq!(truncate_text("abcdefghij klm", 10), "abcdefghij [...]");
        assert_eq!(truncate_text("Sentence one. Two", 15), "Sentence one. [...]");
        // A period too early is ignored
        assert_eq!(truncate_text("A. bcdefghijklmnop", 10), "A. bcdefgh [...]");
    }

    #[test]
    fn test_truncate_text_multibyte() {
        let text = "é".repeat(20);
        assert_eq!(truncate_text(&text, 5), format!("{} [...]", "é".repeat(5)));
    }

    #[test]
    fn test_render_context_markdown() {
        let mut ctx = Context::new();
        ctx.add_search_query("capital of France");
        ctx.add_visited_url("https://en.wikipedia.org/wiki/Paris");
        ctx.add_extraction(
            "https://en.wikipedia.org/wiki/Paris",
            ExtractionRecord {
                summary: "Paris is the capital.".to_string(),
                key_points: vec!["Capital of France".to_string()],
                ..ExtractionRecord::default()
            },
        );
        ctx.accept_final_answer("Paris");

        let md = render_context_markdown(&ctx);
        assert!(md.starts_with("# Web Scraping Context Summary"));
        assert!(md.contains("## Visited URLs\n1. https://en.wikipedia.org/wiki/Paris"));
        assert!(md.contains("## Search Queries\n1. capital of France"));
        assert!(md.contains("### Source 1: https://en.wikipedia.org/wiki/Paris\nParis is the capital."));
        assert!(md.contains("\nKey points:\n- Capital of France"));
        assert!(md.ends_with("## Final Answer\nParis"));
    }

    #[tokio::test]
    async fn test_save_run_writes_files() {
        let dir = std::env::temp_dir().join(format!("minion-output-{}", uuid::Uuid::new_v4()));
        let writer = OutputWriter::new(&dir);
        let ctx = Context::new();

        let written = writer.save_run("Paris", &ctx).await;
        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read_to_string(dir.join(FINAL_OUTPUT_FILE)).unwrap(), "Paris");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(CONTEXT_JSON_FILE)).unwrap()).unwrap();
        assert!(json["visited_urls"].is_array());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
