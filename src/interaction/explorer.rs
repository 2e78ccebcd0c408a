//! Bounded page exploration
//!
//! Scrolls, discovers elements, plans a short list of operations (oracle
//! first, rules as fallback) and runs them under one wall-clock budget.
//! Operation failures are logged and skipped; an exhausted budget ends the
//! run immediately with `timed_out` set.

use crate::browser::PageDriver;
use crate::error::{InteractionError, Result};
use crate::interaction::elements::{self, ElementCounts, ElementDescriptor};
use crate::interaction::rules;
use crate::oracle::{parse_json_reply, ChatMessage, Oracle, ResponseFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, instrument, warn};

const SCROLL_SCRIPT: &str =
    "window.scrollTo({ top: document.body.scrollHeight / 2, behavior: 'smooth' }); true";

const PLAN_PROMPT: &str = "You help a web agent reveal information on the current page. \
Given the user's goal and the page's interactive elements, choose at most five operations \
that would reveal or refine content relevant to the goal. Never buy, pay, delete, sign out \
or submit forms other than a site search. \
Respond with a single JSON object: {\"interactions\": [{\"selector\": string, \
\"type\": \"click\" | \"fill\" | \"select\" | \"check\" | \"uncheck\", \"value\": string}]}. \
Use only selectors from the element list.";

/// Elements shown to the oracle when asking for a plan
const PROMPT_ELEMENTS: usize = 40;

/// One element operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionOp {
    /// Click a button or link
    Click,
    /// Type into an input
    Fill,
    /// Choose a dropdown option
    Select,
    /// Check a checkbox or radio
    Check,
    /// Uncheck a checkbox
    Uncheck,
}

impl InteractionOp {
    /// Lenient parse of an oracle-supplied operation name
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "click" => Some(Self::Click),
            "fill" | "type" | "input" => Some(Self::Fill),
            "select" | "select_option" => Some(Self::Select),
            "check" | "toggle" => Some(Self::Check),
            "uncheck" => Some(Self::Uncheck),
            _ => None,
        }
    }
}

/// An operation on one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionStep {
    /// Target selector
    pub selector: String,
    /// Operation
    #[serde(rename = "type")]
    pub op: InteractionOp,
    /// Text to type or option to select
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Press Enter after filling (search forms only)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub submit: bool,
}

impl InteractionStep {
    /// Build a step
    pub fn new(selector: &str, op: InteractionOp, value: Option<String>) -> Self {
        Self {
            selector: selector.to_string(),
            op,
            value,
            submit: false,
        }
    }

    /// Lenient parse of one `{selector, type, value}` object
    pub fn from_value(value: &Value) -> Option<Self> {
        let selector = value.get("selector")?.as_str()?.trim();
        if selector.is_empty() {
            return None;
        }
        let op = value
            .get("type")
            .or_else(|| value.get("op"))
            .or_else(|| value.get("action"))
            .and_then(Value::as_str)
            .and_then(InteractionOp::parse)?;
        let text = match value.get("value") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let submit = value.get("submit").and_then(Value::as_bool).unwrap_or(false);
        Some(Self {
            selector: selector.to_string(),
            op,
            value: text,
            submit,
        })
    }

    /// Every well-formed step of a JSON array; others are dropped
    pub fn parse_list(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

/// What one exploration did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionReport {
    /// Ordered log of performed operations
    pub actions_performed: Vec<String>,
    /// Element counts by category
    pub elements_found: ElementCounts,
    /// The time budget ran out
    pub timed_out: bool,
}

/// Explores a page under a time budget
pub struct InteractionExplorer {
    oracle: Option<Arc<dyn Oracle>>,
    max_time: Duration,
    settle: Duration,
}

impl InteractionExplorer {
    /// Rule-based explorer with the given budget
    pub fn new(max_time: Duration) -> Self {
        Self {
            oracle: None,
            max_time,
            settle: Duration::from_millis(500),
        }
    }

    /// Ask this oracle for a plan before falling back to rules
    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Pause after each operation so the page can react
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Current interactive elements; empty when discovery fails
    pub async fn snapshot(&self, page: &dyn PageDriver) -> Vec<ElementDescriptor> {
        match elements::discover(page).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Element discovery failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Scroll, discover, plan and act toward `goal`
    #[instrument(skip(self, page))]
    pub async fn explore(&self, page: &dyn PageDriver, goal: &str) -> InteractionReport {
        let deadline = Instant::now() + self.max_time;
        let mut run = Run::new(deadline);

        match run.bounded(page.evaluate(SCROLL_SCRIPT)).await {
            Ok(Ok(_)) => {
                run.log("Scrolled down the page");
                run.settle(self.settle).await;
            }
            Ok(Err(e)) => warn!("Scroll failed: {}", e),
            Err(_) => return run.finish(),
        }

        let found = match run.bounded(elements::discover(page)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("Element discovery failed: {}", e);
                Vec::new()
            }
            Err(_) => return run.finish(),
        };
        run.report.elements_found = ElementCounts::tally(&found);
        info!("Found {} interactive elements", found.len());

        let steps = match &self.oracle {
            Some(oracle) => match run.bounded(self.oracle_plan(oracle.as_ref(), goal, &found)).await {
                Ok(Some(steps)) => steps,
                Ok(None) => rules::plan(goal, &found),
                Err(_) => return run.finish(),
            },
            None => rules::plan(goal, &found),
        };
        debug!("Planned {} interactions", steps.len());

        self.run_steps(page, &steps, &found, &mut run).await;
        run.finish()
    }

    /// Run an explicit step list under the same budget and safety rules
    #[instrument(skip(self, page, steps), fields(steps = steps.len()))]
    pub async fn apply(&self, page: &dyn PageDriver, steps: &[InteractionStep]) -> InteractionReport {
        let deadline = Instant::now() + self.max_time;
        let mut run = Run::new(deadline);

        let found = match run.bounded(elements::discover(page)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("Element discovery failed: {}", e);
                Vec::new()
            }
            Err(_) => return run.finish(),
        };
        run.report.elements_found = ElementCounts::tally(&found);

        self.run_steps(page, steps, &found, &mut run).await;
        run.finish()
    }

    async fn run_steps(
        &self,
        page: &dyn PageDriver,
        steps: &[InteractionStep],
        found: &[ElementDescriptor],
        run: &mut Run,
    ) {
        for step in steps {
            let target = found.iter().find(|e| e.selector == step.selector);
            let label = target
                .map(|e| e.label.clone())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| step.selector.clone());

            if step.op == InteractionOp::Click && rules::is_irreversible(&label) {
                warn!("Refusing to click \"{}\"", label);
                continue;
            }

            match run.bounded(perform(page, step)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Interaction failed: {}", e);
                    continue;
                }
                Err(_) => return,
            }
            run.log(describe(step, &label));

            // Enter only on fields that look like a site search
            let is_search = target.is_some_and(ElementDescriptor::is_search_field);
            if step.op == InteractionOp::Fill && step.submit && is_search {
                match run.bounded(page.press_key(&step.selector, "Enter")).await {
                    Ok(Ok(())) => run.log("Submitted search form"),
                    Ok(Err(e)) => warn!("Search submit failed: {}", e),
                    Err(_) => return,
                }
            }

            run.settle(self.settle).await;
        }
    }

    async fn oracle_plan(
        &self,
        oracle: &dyn Oracle,
        goal: &str,
        found: &[ElementDescriptor],
    ) -> Option<Vec<InteractionStep>> {
        let listed: Vec<&ElementDescriptor> =
            found.iter().filter(|e| e.visible).take(PROMPT_ELEMENTS).collect();
        if listed.is_empty() {
            return None;
        }
        let element_lines = listed
            .iter()
            .map(|e| format!("- {}", e.describe()))
            .collect::<Vec<_>>()
            .join("\n");
        let messages = [
            ChatMessage::system(PLAN_PROMPT),
            ChatMessage::user(format!("Goal: {}\n\nElements:\n{}", goal, element_lines)),
        ];

        let reply = match oracle.complete(&messages, ResponseFormat::Json).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Interaction planning failed, using rules: {}", e);
                return None;
            }
        };
        let value: Value = match parse_json_reply(&reply) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unusable interaction plan, using rules: {}", e);
                return None;
            }
        };

        let steps: Vec<InteractionStep> = InteractionStep::parse_list(&value["interactions"])
            .into_iter()
            .filter(|s| listed.iter().any(|e| e.selector == s.selector))
            .collect();
        (!steps.is_empty()).then_some(steps)
    }
}

/// Budget and log of one exploration
struct Run {
    deadline: Instant,
    report: InteractionReport,
}

impl Run {
    fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            report: InteractionReport::default(),
        }
    }

    fn log<S: Into<String>>(&mut self, action: S) {
        let action = action.into();
        info!("{}", action);
        self.report.actions_performed.push(action);
    }

    /// Run `fut` within the remaining budget; `Err` marks the run timed out
    async fn bounded<F: Future>(&mut self, fut: F) -> std::result::Result<F::Output, InteractionError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            self.report.timed_out = true;
            return Err(InteractionError::Timeout(0));
        }
        match timeout(remaining, fut).await {
            Ok(output) => Ok(output),
            Err(_) => {
                warn!("Interaction budget exhausted");
                self.report.timed_out = true;
                Err(InteractionError::Timeout(remaining.as_millis() as u64))
            }
        }
    }

    async fn settle(&self, delay: Duration) {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let delay = delay.min(remaining);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn finish(self) -> InteractionReport {
        self.report
    }
}

async fn perform(page: &dyn PageDriver, step: &InteractionStep) -> Result<()> {
    let value = step.value.as_deref().unwrap_or_default();
    match step.op {
        InteractionOp::Click => page.click(&step.selector).await,
        InteractionOp::Fill => page.fill(&step.selector, value).await,
        InteractionOp::Select => page.select_option(&step.selector, value).await,
        InteractionOp::Check => page.set_checked(&step.selector, true).await,
        InteractionOp::Uncheck => page.set_checked(&step.selector, false).await,
    }
}

fn describe(step: &InteractionStep, label: &str) -> String {
    let value = step.value.as_deref().unwrap_or_default();
    match step.op {
        InteractionOp::Click => format!("Clicked on element: {}", label),
        InteractionOp::Fill => format!("Filled in text input \"{}\" with \"{}\"", label, value),
        InteractionOp::Select => format!("Selected \"{}\" in \"{}\"", value, label),
        InteractionOp::Check => format!("Checked \"{}\"", label),
        InteractionOp::Uncheck => format!("Unchecked \"{}\"", label),
    }
}
