//! Minion Web command line
//!
//! Runs one goal to completion and prints the answer.

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use minion_web::browser::{BrowserController, WaitUntil};
use minion_web::config::{AgentConfig, AgentMode};
use minion_web::oracle::OpenAiOracle;
use minion_web::Agent;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Control loop selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Oracle-planned actions
    Planned,
    /// Visit search results in order
    Sequential,
}

impl From<Mode> for AgentMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Planned => AgentMode::Planned,
            Mode::Sequential => AgentMode::Sequential,
        }
    }
}

/// Minion Web agent
#[derive(Parser, Debug)]
#[command(name = "minion")]
#[command(version)]
#[command(about = "Autonomous web-browsing agent that answers a goal")]
struct Args {
    /// What to find out
    goal: String,

    /// Run the browser headless (overrides MINION_HEADLESS)
    #[arg(long)]
    headless: Option<bool>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Maximum number of distinct URLs to visit
    #[arg(long)]
    max_urls: Option<usize>,

    /// Maximum number of loop iterations
    #[arg(long)]
    max_steps: Option<usize>,

    /// Directory for the answer and context files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not write output files
    #[arg(long, conflicts_with = "output_dir")]
    no_output: bool,

    /// Model name for the oracle
    #[arg(long)]
    model: Option<String>,

    /// Control loop
    #[arg(long, value_enum, default_value = "planned")]
    mode: Mode,

    /// Path to Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Page readiness after navigation: load, domcontentloaded or networkidle
    #[arg(long, value_parser = parse_wait_until)]
    wait_until: Option<WaitUntil>,
}

fn parse_wait_until(raw: &str) -> Result<WaitUntil, String> {
    WaitUntil::parse(raw).ok_or_else(|| format!("unknown readiness condition '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AgentConfig::from_env().context("loading configuration")?;
    if let Some(headless) = args.headless {
        config.browser.headless = headless;
    }
    if let Some(max) = args.max_urls {
        config.max_visited_urls = max;
    }
    if let Some(max) = args.max_steps {
        config.max_steps = max;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = Some(dir);
    }
    if args.no_output {
        config.output_dir = None;
    }
    if let Some(model) = args.model {
        config.oracle.model = model;
    }
    if let Some(path) = args.chrome_path {
        config.browser.chrome_path = Some(path);
    }
    if let Some(wait) = args.wait_until {
        config.browser.wait_until = wait;
    }
    config.mode = args.mode.into();
    config.validate()?;

    let oracle = OpenAiOracle::new(&config.oracle).context("creating oracle client")?;
    tracing::info!("Minion Web {} starting (model: {})", minion_web::VERSION, oracle.model());

    let controller = BrowserController::with_config(config.browser.clone())
        .await
        .context("launching browser")?;
    let page = controller.new_page().await.context("opening page")?;

    let mut agent = Agent::new(Arc::new(page), Arc::new(oracle), config);
    let outcome = agent.run(&args.goal).await;

    tracing::info!(
        "Done after {} steps ({}), visited {} URLs",
        outcome.steps,
        outcome.termination,
        outcome.context.visited_urls().len()
    );
    for entry in outcome.context.history() {
        tracing::debug!("{}", entry);
    }

    println!("{}", outcome.answer);

    if let Err(e) = controller.close().await {
        tracing::warn!("Browser did not close cleanly: {}", e);
    }
    Ok(())
}
