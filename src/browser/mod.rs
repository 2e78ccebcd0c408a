//! Browser automation module
//!
//! This module provides the page capability the agent consumes
//! ([`PageDriver`]) and its ChromiumOxide implementation, including
//! lifecycle management and navigation.

pub mod controller;
pub mod driver;
pub mod navigation;

pub use controller::{BrowserConfig, BrowserConfigBuilder, BrowserController, PageHandle};
pub use driver::{js_string, PageDriver};
pub use navigation::{NavigationOptions, NavigationResult, PageNavigator, UrlValidator, WaitUntil};
