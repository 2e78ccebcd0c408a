//! Page navigation functionality
//!
//! This module handles URL navigation with retry logic, timeout handling,
//! and human-like behavior simulation, plus the URL checks the planner
//! relies on to reject placeholder targets.

use crate::browser::PageHandle;
use crate::error::{Error, NavigationError, Result};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Hosts that oracles tend to emit as stand-ins for "some URL"
const PLACEHOLDER_HOSTS: &[&str] = &["example.com", "www.example.com", "your-url.com", "url.com"];

/// Options for page navigation
#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Wait until condition (default: load)
    pub wait_until: WaitUntil,
    /// Number of retry attempts (default: 1)
    pub retries: u32,
    /// Delay between retries in ms (default: 1000)
    pub retry_delay_ms: u64,
    /// Simulate human-like behavior (default: true)
    pub human_like: bool,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            wait_until: WaitUntil::Load,
            retries: 1,
            retry_delay_ms: 1000,
            human_like: true,
        }
    }
}

/// Condition to wait for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Wait until load event fires
    Load,
    /// Wait until DOMContentLoaded event fires
    DomContentLoaded,
    /// Wait until load, then a short quiet period
    NetworkIdle,
}

impl WaitUntil {
    /// Parse `load`, `domcontentloaded` or `networkidle` (case and separators ignored)
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "load" => Some(Self::Load),
            "domcontentloaded" => Some(Self::DomContentLoaded),
            "networkidle" => Some(Self::NetworkIdle),
            _ => None,
        }
    }
}

/// Result of a navigation operation
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// Final URL after any redirects
    pub final_url: String,
    /// Page title
    pub title: Option<String>,
    /// Navigation duration in milliseconds
    pub duration_ms: u64,
}

/// URL validation utilities
pub struct UrlValidator;

impl UrlValidator {
    /// Validate a URL for navigation
    pub fn validate(url: &str) -> std::result::Result<(), String> {
        if url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }

        if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("file://")
        {
            return Err(format!(
                "URL must start with http://, https://, or file://: {}",
                url
            ));
        }

        if url.len() > 2048 {
            return Err("URL exceeds maximum length of 2048 characters".to_string());
        }

        Url::parse(url).map_err(|e| format!("URL does not parse: {}", e))?;
        Ok(())
    }

    /// Absolute http(s) URL with a host
    pub fn is_absolute_http(url: &str) -> bool {
        Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false)
    }

    /// Empty, unparseable, or pointing at a known stand-in domain
    pub fn is_placeholder(url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || !Self::is_absolute_http(url) {
            return true;
        }
        match Self::extract_host(url) {
            Some(host) => PLACEHOLDER_HOSTS.contains(&host.as_str()),
            None => true,
        }
    }

    /// Extract host from URL (lowercased, without port)
    pub fn extract_host(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed.host_str().map(|h| h.to_ascii_lowercase())
    }
}

/// Page navigator with advanced navigation capabilities
pub struct PageNavigator;

impl PageNavigator {
    /// Navigate to a URL with default options
    #[instrument(skip(page, options))]
    pub async fn goto(
        page: &PageHandle,
        url: &str,
        options: Option<NavigationOptions>,
    ) -> Result<NavigationResult> {
        let opts = options.unwrap_or_default();
        let start = std::time::Instant::now();

        UrlValidator::validate(url).map_err(NavigationError::InvalidUrl)?;

        info!("Navigating to: {}", url);

        let mut last_error = None;
        for attempt in 0..=opts.retries {
            if attempt > 0 {
                warn!("Navigation retry attempt {} of {}", attempt, opts.retries);
                tokio::time::sleep(Duration::from_millis(opts.retry_delay_ms)).await;
            }

            match Self::navigate_once(&page.page, url, &opts).await {
                Ok(result) => {
                    page.set_url(result.final_url.clone()).await;

                    if opts.human_like {
                        Self::simulate_human_behavior(&page.page).await;
                    }

                    return Ok(NavigationResult {
                        duration_ms: start.elapsed().as_millis() as u64,
                        ..result
                    });
                }
                Err(e) => {
                    warn!("Navigation attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            NavigationError::LoadFailed("Navigation failed after all retries".to_string()).into()
        }))
    }

    /// Perform a single navigation attempt
    async fn navigate_once(
        page: &chromiumoxide::Page,
        url: &str,
        opts: &NavigationOptions,
    ) -> Result<NavigationResult> {
        let timeout = Duration::from_millis(opts.timeout_ms);

        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| NavigationError::Timeout(opts.timeout_ms))?
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

        Self::wait_for_ready(page, opts).await?;

        let final_url = page
            .url()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?
            .unwrap_or_else(|| url.to_string());

        let title = page.get_title().await.ok().flatten();

        debug!("Navigation complete: {} -> {}", url, final_url);

        Ok(NavigationResult {
            final_url,
            title,
            duration_ms: 0,
        })
    }

    /// Wait for page to be ready based on wait_until condition
    async fn wait_for_ready(page: &chromiumoxide::Page, opts: &NavigationOptions) -> Result<()> {
        let script = match opts.wait_until {
            WaitUntil::Load => {
                r#"
                    new Promise(resolve => {
                        if (document.readyState === 'complete') {
                            resolve(true);
                        } else {
                            window.addEventListener('load', () => resolve(true));
                        }
                    })
                "#
            }
            WaitUntil::DomContentLoaded => {
                r#"
                    new Promise(resolve => {
                        if (document.readyState !== 'loading') {
                            resolve(true);
                        } else {
                            document.addEventListener('DOMContentLoaded', () => resolve(true));
                        }
                    })
                "#
            }
            WaitUntil::NetworkIdle => {
                r#"
                    new Promise(resolve => {
                        if (document.readyState === 'complete') {
                            setTimeout(() => resolve(true), 500);
                        } else {
                            window.addEventListener('load', () => {
                                setTimeout(() => resolve(true), 500);
                            });
                        }
                    })
                "#
            }
        };

        let timeout = Duration::from_millis(opts.timeout_ms);
        tokio::time::timeout(timeout, page.evaluate(script))
            .await
            .map_err(|_| NavigationError::Timeout(opts.timeout_ms))?
            .map_err(|e| Error::cdp(e.to_string()))?;

        Ok(())
    }

    /// Small random pause and scroll so result pages settle like a real visit
    async fn simulate_human_behavior(page: &chromiumoxide::Page) {
        let delay = rand::random::<u64>() % 500 + 200;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let scroll_script = r#"
            window.scrollTo({
                top: Math.random() * 100 + 50,
                behavior: 'smooth'
            });
        "#;

        let _ = page.evaluate(scroll_script).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    /// Go back in browser history
    #[instrument(skip(page))]
    pub async fn back(page: &PageHandle) -> Result<()> {
        page.page
            .evaluate("window.history.back()")
            .await
            .map_err(|e| NavigationError::BackFailed(e.to_string()))?;

        tokio::time::sleep(Duration::from_millis(500)).await;

        if let Ok(Some(url)) = page.page.url().await {
            page.set_url(url).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_options_default() {
        let opts = NavigationOptions::default();
        assert_eq!(opts.timeout_ms, 30000);
        assert_eq!(opts.retries, 1);
        assert!(opts.human_like);
        assert_eq!(opts.wait_until, WaitUntil::Load);
    }

    #[test]
    fn test_wait_until_parse() {
        assert_eq!(WaitUntil::parse("load"), Some(WaitUntil::Load));
        assert_eq!(WaitUntil::parse("DOMContentLoaded"), Some(WaitUntil::DomContentLoaded));
        assert_eq!(WaitUntil::parse("network-idle"), Some(WaitUntil::NetworkIdle));
        assert_eq!(WaitUntil::parse("eventually"), None);
    }

    #[test]
    fn test_url_validation_valid() {
        assert!(UrlValidator::validate("http://example.com").is_ok());
        assert!(UrlValidator::validate("https://example.com?foo=bar&baz=123").is_ok());
        assert!(UrlValidator::validate("file:///path/to/file.html").is_ok());
    }

    #[test]
    fn test_url_validation_empty() {
        let result = UrlValidator::validate("");
        assert!(result.unwrap_err().contains("empty"));
    }

    #[test]
    fn test_url_validation_no_protocol() {
        let result = UrlValidator::validate("example.com");
        assert!(result.unwrap_err().contains("must start with"));
    }

    #[test]
    fn test_url_validation_too_long() {
        let long_url = format!("https://example.com/{}", "a".repeat(3000));
        let result = UrlValidator::validate(&long_url);
        assert!(result.unwrap_err().contains("maximum length"));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(UrlValidator::is_placeholder(""));
        assert!(UrlValidator::is_placeholder("   "));
        assert!(UrlValidator::is_placeholder("https://example.com"));
        assert!(UrlValidator::is_placeholder("https://www.example.com/page"));
        assert!(UrlValidator::is_placeholder("/relative/path"));
        assert!(UrlValidator::is_placeholder("ftp://files.org/x"));
        assert!(!UrlValidator::is_placeholder("https://example.org/x"));
        assert!(!UrlValidator::is_placeholder("https://en.wikipedia.org/wiki/Paris"));
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(
            UrlValidator::extract_host("http://localhost:8080/api"),
            Some("localhost".to_string())
        );
        assert_eq!(
            UrlValidator::extract_host("https://Google.com"),
            Some("google.com".to_string())
        );
        assert_eq!(UrlValidator::extract_host("example.com"), None);
    }
}
