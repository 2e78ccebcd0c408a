//! Error types for Minion Web
//!
//! This module provides the error hierarchy for every agent component using
//! `thiserror`. Most of these never reach the caller of [`crate::Agent::run`]:
//! the loop treats navigation, interaction and extraction failures as
//! recoverable and folds them into its state instead.

use thiserror::Error;

/// The main error type for Minion Web operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser-related errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Navigation errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Content extraction errors
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Reasoning oracle errors
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Page interaction errors
    #[error("Interaction error: {0}")]
    Interaction(#[from] InteractionError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Screenshot could not be taken or written
    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Navigation timeout
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),

    /// History navigation failed
    #[error("Could not go back: {0}")]
    BackFailed(String),
}

/// Content extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Extraction failed
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Content parsing failed
    #[error("Content parsing failed: {0}")]
    ParsingFailed(String),

    /// PDF download or text extraction failed
    #[error("PDF extraction failed: {0}")]
    PdfFailed(String),

    /// JavaScript execution failed
    #[error("JavaScript execution failed: {0}")]
    JsExecutionFailed(String),
}

/// Reasoning oracle errors
#[derive(Error, Debug)]
pub enum OracleError {
    /// No credential configured
    #[error("Missing API key for the oracle endpoint")]
    MissingApiKey,

    /// Endpoint answered with a non-success status
    #[error("Oracle API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message returned by the endpoint
        message: String,
    },

    /// Reply carried no message content
    #[error("Oracle reply had no content")]
    EmptyReply,

    /// Reply was not the JSON object the call expected
    #[error("Malformed oracle reply: {0}")]
    MalformedReply(String),

    /// Request could not be sent or timed out
    #[error("Oracle request failed: {0}")]
    RequestFailed(String),
}

/// Page interaction errors
#[derive(Error, Debug)]
pub enum InteractionError {
    /// Element not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Operation on an element failed
    #[error("Element operation '{op}' failed on {selector}: {message}")]
    OperationFailed {
        /// Operation name (click, fill, ...)
        op: String,
        /// Target selector
        selector: String,
        /// Driver message
        message: String,
    },

    /// Exploration budget spent
    #[error("Interaction budget of {0}ms exhausted")]
    Timeout(u64),
}

/// Result type alias for Minion Web operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a configuration error from a string
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}
