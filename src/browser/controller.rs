//! Browser lifecycle management
//!
//! This module handles browser launch and shutdown, and implements
//! [`PageDriver`] for the chromiumoxide page the agent works on.

use crate::browser::driver::{js_string, PageDriver};
use crate::browser::navigation::{NavigationOptions, NavigationResult, PageNavigator, WaitUntil};
use crate::error::{BrowserError, Error, ExtractionError, InteractionError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Chrome flags that keep automation from being trivially fingerprinted
/// and stop background throttling of the single working tab.
const DEFAULT_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-background-timer-throttling",
    "--disable-popup-blocking",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--no-first-run",
    "--no-default-browser-check",
];

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Browser window width (default: 1920)
    pub width: u32,
    /// Browser window height (default: 1080)
    pub height: u32,
    /// Enable sandbox (default: true)
    pub sandbox: bool,
    /// User agent string (None = use default)
    pub user_agent: Option<String>,
    /// Navigation timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Readiness condition after each navigation (default: load)
    pub wait_until: WaitUntil,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1920,
            height: 1080,
            sandbox: true,
            user_agent: None,
            timeout_ms: 30000,
            chrome_path: None,
            wait_until: WaitUntil::Load,
            extra_args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl BrowserConfig {
    /// Create a new config builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set viewport dimensions
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Enable/disable sandbox
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.config.sandbox = sandbox;
        self
    }

    /// Set user agent
    pub fn user_agent<S: Into<String>>(mut self, ua: S) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    /// Set navigation timeout
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Set Chrome path
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set the readiness condition after navigation
    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.config.wait_until = wait_until;
        self
    }

    /// Add extra Chrome argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Build the config
    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// Handle to an open browser page
#[derive(Clone)]
pub struct PageHandle {
    pub(crate) page: Page,
    pub(crate) url: Arc<RwLock<String>>,
    pub(crate) navigation: NavigationOptions,
}

impl PageHandle {
    /// Get the underlying chromiumoxide Page
    pub fn inner(&self) -> &Page {
        &self.page
    }

    /// Set the current URL (internal use)
    pub(crate) async fn set_url(&self, url: String) {
        *self.url.write().await = url;
    }

    async fn run_element_script(&self, op: &str, selector: &str, script: String) -> Result<()> {
        let ok = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| InteractionError::OperationFailed {
                op: op.to_string(),
                selector: selector.to_string(),
                message: e.to_string(),
            })?
            .value()
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if ok {
            Ok(())
        } else {
            Err(InteractionError::ElementNotFound(selector.to_string()).into())
        }
    }
}

#[async_trait]
impl PageDriver for PageHandle {
    async fn goto(&self, url: &str) -> Result<NavigationResult> {
        PageNavigator::goto(self, url, Some(self.navigation.clone())).await
    }

    async fn current_url(&self) -> String {
        match self.page.url().await {
            Ok(Some(url)) => url,
            _ => self.url.read().await.clone(),
        }
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ExtractionError::ExtractionFailed(e.to_string()).into())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ExtractionError::JsExecutionFailed(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    #[instrument(skip(self))]
    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| InteractionError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| InteractionError::OperationFailed {
                op: "click".to_string(),
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.focus();
                el.value = {};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            js_string(selector),
            js_string(value)
        );
        self.run_element_script("fill", selector, script).await
    }

    #[instrument(skip(self))]
    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el || !el.options) return false;
                const wanted = {}.toLowerCase();
                const opt = Array.from(el.options).find(o =>
                    o.value.toLowerCase() === wanted || o.text.trim().toLowerCase() === wanted
                ) || Array.from(el.options).find(o => o.text.toLowerCase().includes(wanted));
                if (!opt) return false;
                el.value = opt.value;
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            js_string(selector),
            js_string(value)
        );
        self.run_element_script("select", selector, script).await
    }

    #[instrument(skip(self))]
    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                if (el.checked !== {}) el.click();
                return true;
            }})()
            "#,
            js_string(selector),
            checked
        );
        self.run_element_script("check", selector, script).await
    }

    #[instrument(skip(self))]
    async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| InteractionError::ElementNotFound(selector.to_string()))?;
        element
            .press_key(key)
            .await
            .map_err(|e| InteractionError::OperationFailed {
                op: "press_key".to_string(),
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        PageNavigator::back(self).await
    }

    #[instrument(skip(self))]
    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))?;
        debug!("Screenshot written to {}", path.display());
        Ok(())
    }
}

/// High-level browser controller
pub struct BrowserController {
    browser: Browser,
    handler: JoinHandle<()>,
    config: BrowserConfig,
}

impl BrowserController {
    /// Create a new browser controller with default config
    #[instrument]
    pub async fn new() -> Result<Self> {
        Self::with_config(BrowserConfig::default()).await
    }

    /// Create a new browser controller with custom config
    #[instrument(skip(config))]
    pub async fn with_config(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser with config: headless={}",
            config.headless
        );

        let mut builder = CdpBrowserConfig::builder();

        builder = builder.viewport(chromiumoxide::handler::viewport::Viewport {
            width: config.width,
            height: config.height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        });

        // chromiumoxide launches headless unless told otherwise
        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder.arg("--no-sandbox");
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| BrowserError::ConfigError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            handler: handler_task,
            config,
        })
    }

    /// Open the page the agent will work on
    #[instrument(skip(self))]
    pub async fn new_page(&self) -> Result<PageHandle> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        if let Some(ref ua) = self.config.user_agent {
            page.set_user_agent(user_agent_override(ua)).await?;
        }

        let navigation = NavigationOptions {
            timeout_ms: self.config.timeout_ms,
            wait_until: self.config.wait_until,
            ..NavigationOptions::default()
        };

        debug!("Created new page");
        Ok(PageHandle {
            page,
            url: Arc::new(RwLock::new("about:blank".to_string())),
            navigation,
        })
    }

    /// Get the browser configuration
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Close the browser
    #[instrument(skip(self))]
    pub async fn close(mut self) -> Result<()> {
        info!("Closing browser");

        self.browser
            .close()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;

        let _ = tokio::time::timeout(Duration::from_secs(5), self.handler).await;

        info!("Browser closed");
        Ok(())
    }
}

/// Network-domain override; applies to every request the page makes
fn user_agent_override(ua: &str) -> SetUserAgentOverrideParams {
    SetUserAgentOverrideParams::new(ua.to_string())
}
