//! Agent configuration
//!
//! Process-start settings: oracle credentials, browser flags and the numeric
//! budgets that bound one task. Values come from defaults, then the
//! environment (optionally a `.env` file), then CLI overrides.

use crate::browser::{BrowserConfig, WaitUntil};
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Default search endpoint; `udm=14` asks for plain web results.
pub const DEFAULT_SEARCH_URL: &str = "https://www.google.com/search";

/// Settings for the OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// API key (Bearer token)
    pub api_key: Option<String>,
    /// Base URL, without the trailing `/chat/completions`
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            timeout_ms: 60_000,
        }
    }
}

/// Which control loop drives the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentMode {
    /// Oracle-planned state machine (SEARCH/NAVIGATE/EXTRACT/INTERACT/FINISH)
    #[default]
    Planned,
    /// Fixed walk: search, visit each result in order, page through results
    Sequential,
}

/// Complete configuration for one agent run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Oracle endpoint settings
    pub oracle: OracleConfig,
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Control loop variant
    pub mode: AgentMode,
    /// Hard cap on distinct visited URLs (default: 15)
    pub max_visited_urls: usize,
    /// Hard cap on loop iterations (default: 30)
    pub max_steps: usize,
    /// Results kept per search page (default: 10)
    pub max_search_results: usize,
    /// Wall-clock budget for exploring one page (default: 20s)
    pub max_interaction_time: Duration,
    /// Content size above which extraction is chunked (default: 10000 chars)
    pub chunk_chars: usize,
    /// Extra attempts after a malformed planner reply (default: 1)
    pub oracle_retries: u32,
    /// Container preferred for HTML extraction (default: `div#main`)
    pub target_selector: Option<String>,
    /// Search endpoint
    pub search_url: String,
    /// Directory for answer and context files (None = don't write)
    pub output_dir: Option<PathBuf>,
    /// Save a screenshot when a search page fails to parse
    pub screenshot_on_error: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            browser: BrowserConfig::default(),
            mode: AgentMode::Planned,
            max_visited_urls: 15,
            max_steps: 30,
            max_search_results: 10,
            max_interaction_time: Duration::from_secs(20),
            chunk_chars: 10_000,
            oracle_retries: 1,
            target_selector: Some("div#main".to_string()),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            output_dir: Some(PathBuf::from("output")),
            screenshot_on_error: false,
        }
    }
}

impl AgentConfig {
    /// Create a new config builder
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Defaults overlaid with environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::config(format!("invalid .env file: {}", e))),
        }

        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.oracle.api_key = Some(key);
        }
        if let Some(model) = lookup("MINION_MODEL") {
            self.oracle.model = model;
        }
        if let Some(base) = lookup("MINION_BASE_URL") {
            self.oracle.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(headless) = lookup("MINION_HEADLESS") {
            self.browser.headless = parse_bool("MINION_HEADLESS", &headless)?;
        }
        if let Some(wait) = lookup("MINION_WAIT_UNTIL") {
            self.browser.wait_until = WaitUntil::parse(&wait).ok_or_else(|| {
                Error::config(format!(
                    "MINION_WAIT_UNTIL expects load, domcontentloaded or networkidle, got '{}'",
                    wait
                ))
            })?;
        }
        if let Some(max) = lookup("MINION_MAX_URLS") {
            self.max_visited_urls = parse_number("MINION_MAX_URLS", &max)?;
        }
        if let Some(secs) = lookup("MINION_MAX_INTERACTION_SECS") {
            self.max_interaction_time =
                Duration::from_secs(parse_number("MINION_MAX_INTERACTION_SECS", &secs)?);
        }
        if let Some(max) = lookup("MINION_MAX_RESULTS") {
            self.max_search_results = parse_number("MINION_MAX_RESULTS", &max)?;
        }
        if let Some(dir) = lookup("MINION_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Reject budgets that would make the loop meaningless
    pub fn validate(&self) -> Result<()> {
        if self.max_visited_urls == 0 {
            return Err(Error::config("max_visited_urls must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(Error::config("max_steps must be at least 1"));
        }
        if self.max_search_results == 0 {
            return Err(Error::config("max_search_results must be at least 1"));
        }
        if self.chunk_chars < 500 {
            return Err(Error::config("chunk_chars must be at least 500"));
        }
        url::Url::parse(&self.search_url)
            .map_err(|e| Error::config(format!("search_url: {}", e)))?;
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!("{} expects a boolean, got '{}'", key, other))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{} expects a number, got '{}'", key, value)))
}

/// Builder for AgentConfig
#[derive(Default)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    /// Set the oracle API key
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.oracle.api_key = Some(key.into());
        self
    }

    /// Set the oracle model
    pub fn model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.oracle.model = model.into();
        self
    }

    /// Set the browser configuration
    pub fn browser(mut self, browser: BrowserConfig) -> Self {
        self.config.browser = browser;
        self
    }

    /// Set the control loop variant
    pub fn mode(mut self, mode: AgentMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the visited URL cap
    pub fn max_visited_urls(mut self, max: usize) -> Self {
        self.config.max_visited_urls = max;
        self
    }

    /// Set the loop iteration cap
    pub fn max_steps(mut self, max: usize) -> Self {
        self.config.max_steps = max;
        self
    }

    /// Set results kept per search page
    pub fn max_search_results(mut self, max: usize) -> Self {
        self.config.max_search_results = max;
        self
    }

    /// Set the per-page exploration budget
    pub fn max_interaction_time(mut self, budget: Duration) -> Self {
        self.config.max_interaction_time = budget;
        self
    }

    /// Set the chunking threshold
    pub fn chunk_chars(mut self, chars: usize) -> Self {
        self.config.chunk_chars = chars;
        self
    }

    /// Set the preferred extraction container
    pub fn target_selector(mut self, selector: Option<String>) -> Self {
        self.config.target_selector = selector;
        self
    }

    /// Set the search endpoint
    pub fn search_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.search_url = url.into();
        self
    }

    /// Set (or clear) the output directory
    pub fn output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.output_dir = dir;
        self
    }

    /// Save screenshots of failed search pages
    pub fn screenshot_on_error(mut self, enabled: bool) -> Self {
        self.config.screenshot_on_error = enabled;
        self
    }

    /// Build the config
    pub fn build(self) -> AgentConfig {
        self.config
    }
}
