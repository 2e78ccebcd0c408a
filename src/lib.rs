//! Minion Web - Autonomous Web-Browsing Agent
//!
//! Give it a goal in plain language; it searches, opens pages, reads them,
//! operates forms when the content is hidden behind them, and stops once a
//! page answers the goal or a budget runs out.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!   goal ────────▶ │    Agent     │ ◀──── Oracle (chat completions)
//!                  └──────┬───────┘
//!                         │ PageDriver (CDP)
//!        ┌────────────┬───┴─────────┬──────────────┐
//!        ▼            ▼             ▼              ▼
//!    ┌────────┐  ┌──────────┐  ┌────────────┐  ┌─────────┐
//!    │ Search │  │ Navigate │  │ Extraction │  │ Interact│
//!    └────────┘  └──────────┘  └────────────┘  └─────────┘
//!                         │
//!                         ▼
//!              Context ──▶ final answer + output files
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use minion_web::browser::BrowserController;
//! use minion_web::config::AgentConfig;
//! use minion_web::oracle::OpenAiOracle;
//! use minion_web::Agent;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::from_env()?;
//!     let controller = BrowserController::with_config(config.browser.clone()).await?;
//!     let page = Arc::new(controller.new_page().await?);
//!     let oracle = Arc::new(OpenAiOracle::new(&config.oracle)?);
//!
//!     let mut agent = Agent::new(page, oracle, config);
//!     let outcome = agent.run("What is the capital of France?").await;
//!     println!("{}", outcome.answer);
//!
//!     controller.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod config;
pub mod error;
pub mod extraction;
pub mod interaction;
pub mod oracle;
pub mod orchestrator;
pub mod output;
pub mod planner;
pub mod search;

// Re-exports for convenience
pub use browser::{BrowserController, PageDriver};
pub use config::{AgentConfig, AgentMode};
pub use error::{Error, Result};
pub use extraction::{ContentExtractor, ExtractionRecord};
pub use oracle::{Oracle, OpenAiOracle};
pub use orchestrator::{Agent, AgentOutcome, TerminationReason};
pub use planner::{Context, PlannerAction, PlannerState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
