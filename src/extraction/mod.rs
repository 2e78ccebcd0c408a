//! Content extraction module
//!
//! This module reads the current page (HTML or PDF), converts it to text,
//! and asks the oracle whether it answers the goal.

pub mod content;
pub mod pdf;
pub mod record;

pub use content::{chunk_text, html_to_markdown, select_container, ContentExtractor};
pub use record::{ExtractionAction, ExtractionRecord};
