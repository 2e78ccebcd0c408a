//! Page capability boundary
//!
//! Everything above this module talks to the browser through [`PageDriver`],
//! so the agent loop can be driven by a real CDP page or by a scripted double.

use crate::browser::NavigationResult;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// The browser operations the agent consumes
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url` and wait for the load-complete signal
    async fn goto(&self, url: &str) -> Result<NavigationResult>;

    /// URL currently shown (after redirects)
    async fn current_url(&self) -> String;

    /// Document title
    async fn title(&self) -> Result<String>;

    /// Full rendered markup
    async fn content(&self) -> Result<String>;

    /// Evaluate a script and return its JSON value (`Null` for undefined)
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Click the first element matching `selector`
    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the value of an input/textarea
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Choose a `<select>` option by value or visible text
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    /// Bring a checkbox/radio to the requested checked state
    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()>;

    /// Send a key press to an element
    async fn press_key(&self, selector: &str, key: &str) -> Result<()>;

    /// Step back in history
    async fn go_back(&self) -> Result<()>;

    /// Write a screenshot of the page to `path`
    async fn screenshot(&self, path: &Path) -> Result<()>;
}

/// Quote a string as a JavaScript literal
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("a'b\"c"), r#""a'b\"c""#);
        assert_eq!(js_string("[data-minion-id=\"3\"]"), r#""[data-minion-id=\"3\"]""#);
    }
}
