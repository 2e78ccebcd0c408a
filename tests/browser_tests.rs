//! Browser module tests
//!
//! These tests verify the browser configuration, navigation types and URL
//! checks. Full browser integration tests require a running Chrome/Chromium
//! instance; the agent tests drive a scripted page instead.

use minion_web::browser::{BrowserConfig, NavigationOptions, NavigationResult, UrlValidator, WaitUntil};

#[test]
fn test_browser_config_default() {
    let config = BrowserConfig::default();
    assert!(config.headless);
    assert_eq!(config.width, 1920);
    assert_eq!(config.height, 1080);
    assert!(config.sandbox);
    assert_eq!(config.timeout_ms, 30000);
    assert!(config.user_agent.is_none());
    assert!(config.chrome_path.is_none());
    assert!(config.extra_args.iter().any(|a| a == "--no-first-run"));
}

#[test]
fn test_browser_config_builder() {
    let defaults = BrowserConfig::default().extra_args.len();
    let config = BrowserConfig::builder()
        .headless(false)
        .viewport(1280, 720)
        .sandbox(false)
        .user_agent("MinionBot/1.0")
        .timeout_ms(60000)
        .chrome_path("/usr/bin/chromium")
        .arg("--disable-gpu")
        .build();

    assert!(!config.headless);
    assert_eq!(config.width, 1280);
    assert_eq!(config.height, 720);
    assert!(!config.sandbox);
    assert_eq!(config.user_agent, Some("MinionBot/1.0".to_string()));
    assert_eq!(config.timeout_ms, 60000);
    assert_eq!(config.chrome_path.as_deref(), Some("/usr/bin/chromium"));
    assert_eq!(config.extra_args.len(), defaults + 1);
}

#[test]
fn test_navigation_options_default() {
    let opts = NavigationOptions::default();
    assert_eq!(opts.timeout_ms, 30000);
    assert_eq!(opts.wait_until, WaitUntil::Load);
    assert_eq!(opts.retries, 1);
    assert_eq!(opts.retry_delay_ms, 1000);
    assert!(opts.human_like);
}

#[test]
fn test_wait_until_selectable() {
    let config = BrowserConfig::builder()
        .wait_until(WaitUntil::DomContentLoaded)
        .build();
    assert_eq!(config.wait_until, WaitUntil::DomContentLoaded);
    assert_eq!(WaitUntil::parse("networkidle"), Some(WaitUntil::NetworkIdle));
    assert_eq!(WaitUntil::parse("load"), Some(WaitUntil::Load));
}

#[test]
fn test_navigation_result_structure() {
    let result = NavigationResult {
        final_url: "https://en.wikipedia.org/wiki/Paris".to_string(),
        title: Some("Paris - Wikipedia".to_string()),
        duration_ms: 1500,
    };

    assert_eq!(result.final_url, "https://en.wikipedia.org/wiki/Paris");
    assert_eq!(result.title.as_deref(), Some("Paris - Wikipedia"));
    assert_eq!(result.duration_ms, 1500);
}

#[test]
fn test_url_validation() {
    assert!(UrlValidator::validate("https://example.org/").is_ok());
    assert!(UrlValidator::validate("file:///tmp/report.pdf").is_ok());
    assert!(UrlValidator::validate("").is_err());
    assert!(UrlValidator::validate("ftp://example.org/").is_err());
    assert!(UrlValidator::validate(&format!("https://a.org/{}", "x".repeat(2100))).is_err());
}

#[test]
fn test_placeholder_urls() {
    assert!(UrlValidator::is_placeholder("https://example.com/article"));
    assert!(UrlValidator::is_placeholder("https://www.example.com"));
    assert!(UrlValidator::is_placeholder("   "));
    assert!(UrlValidator::is_placeholder("/wiki/Paris"));
    assert!(!UrlValidator::is_placeholder("https://example.org/"));
    assert!(!UrlValidator::is_placeholder("https://en.wikipedia.org/wiki/Paris"));
}

#[test]
fn test_host_helpers() {
    assert_eq!(
        UrlValidator::extract_host("https://EN.Wikipedia.org:443/wiki/Paris"),
        Some("en.wikipedia.org".to_string())
    );
    assert!(UrlValidator::is_absolute_http("http://a.org/x"));
    assert!(!UrlValidator::is_absolute_http("mailto:someone@a.org"));
}
