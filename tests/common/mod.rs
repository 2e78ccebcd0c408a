//! Scripted browser and oracle doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use minion_web::browser::{NavigationResult, PageDriver};
use minion_web::config::AgentConfig;
use minion_web::error::{NavigationError, OracleError, Result};
use minion_web::interaction::{InteractionExplorer, ELEMENT_ID_ATTR};
use minion_web::oracle::{ChatMessage, Oracle, ResponseFormat};
use minion_web::Agent;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SEARCH_BASE: &str = "https://search.test/search";

/// Result page markup listing `(title, url)` pairs
pub fn results_page(results: &[(&str, &str)]) -> String {
    let items: String = results
        .iter()
        .map(|(title, url)| format!(r#"<div class="g"><a href="{}"><h3>{}</h3></a></div>"#, url, title))
        .collect();
    format!("<html><body><div id=\"search\">{}</div></body></html>", items)
}

/// Article markup with a `div#main` container
pub fn article(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title><script>var x = 1;</script></head>\
         <body><nav>Menu</nav><div id=\"main\"><h1>{}</h1><p>{}</p></div></body></html>",
        title, title, body
    )
}

/// Page double serving canned markup per URL
///
/// Element lists answer the discovery script for the loaded URL, clicks on
/// registered selectors load another page, and every element operation is
/// logged as `"<op> <selector>[=<value>]"`.
#[derive(Default)]
pub struct MockPage {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    elements: HashMap<String, Value>,
    click_targets: HashMap<String, String>,
    click_delay: Duration,
    search_html: Mutex<String>,
    current: Mutex<String>,
    pub gotos: Mutex<Vec<String>>,
    pub ops: Mutex<Vec<String>>,
    pub backs: Mutex<usize>,
    pub screenshots: Mutex<Vec<PathBuf>>,
}

impl MockPage {
    pub fn new() -> Self {
        Self {
            current: Mutex::new("about:blank".to_string()),
            search_html: Mutex::new(results_page(&[])),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn with_results(self, results: &[(&str, &str)]) -> Self {
        *self.search_html.lock().unwrap() = results_page(results);
        self
    }

    /// Loading `from` lands on `to`
    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Discovery payload for `url`, in the discovery script's shape
    pub fn with_elements(mut self, url: &str, elements: Value) -> Self {
        self.elements.insert(url.to_string(), elements);
        self
    }

    /// Clicking `selector` loads `url`
    pub fn with_click_target(mut self, selector: &str, url: &str) -> Self {
        self.click_targets.insert(selector.to_string(), url.to_string());
        self
    }

    /// Every click takes this long
    pub fn with_click_delay(mut self, delay: Duration) -> Self {
        self.click_delay = delay;
        self
    }

    /// Navigate without recording, for tests that start on a loaded page
    pub fn load(&self, url: &str) {
        *self.current.lock().unwrap() = url.to_string();
    }

    pub fn gotos(&self) -> Vec<String> {
        self.gotos.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    /// Navigations that were not searches
    pub fn page_visits(&self) -> Vec<String> {
        self.gotos()
            .into_iter()
            .filter(|u| !u.starts_with(SEARCH_BASE))
            .collect()
    }

    fn html_for(&self, url: &str) -> Option<String> {
        if url.starts_with(SEARCH_BASE) {
            return Some(self.search_html.lock().unwrap().clone());
        }
        self.pages.get(url).cloned()
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

/// Discovery entry as the in-page script reports it
pub fn element(id: usize, tag: &str, input_type: &str, label: &str) -> Value {
    let toggle = input_type == "checkbox" || input_type == "radio";
    let value = (tag == "input" && !toggle).then_some("");
    let checked = toggle.then_some(false);
    serde_json::json!({
        "id": id.to_string(),
        "tag": tag,
        "type": input_type,
        "role": "",
        "label": label,
        "visible": true,
        "value": value,
        "checked": checked,
        "options": [],
    })
}

/// Selector the discovery script assigns to element `id`
pub fn selector(id: usize) -> String {
    format!("[{}=\"{}\"]", ELEMENT_ID_ATTR, id)
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str) -> Result<NavigationResult> {
        self.gotos.lock().unwrap().push(url.to_string());
        let landed = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        if self.html_for(&landed).is_none() {
            return Err(NavigationError::LoadFailed(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)).into());
        }
        *self.current.lock().unwrap() = landed.clone();
        Ok(NavigationResult {
            final_url: landed,
            title: None,
            duration_ms: 5,
        })
    }

    async fn current_url(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    async fn title(&self) -> Result<String> {
        Ok(format!("Title of {}", self.current.lock().unwrap()))
    }

    async fn content(&self) -> Result<String> {
        let current = self.current.lock().unwrap().clone();
        Ok(self.html_for(&current).unwrap_or_default())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script.contains("document.contentType") {
            return Ok(Value::String("text/html".to_string()));
        }
        if script.contains(ELEMENT_ID_ATTR) {
            let current = self.current.lock().unwrap().clone();
            return Ok(self.elements.get(&current).cloned().unwrap_or(Value::Null));
        }
        if script.contains("scrollTo") {
            return Ok(Value::Bool(true));
        }
        Ok(Value::Null)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if !self.click_delay.is_zero() {
            tokio::time::sleep(self.click_delay).await;
        }
        self.log(format!("click {}", selector));
        if let Some(url) = self.click_targets.get(selector) {
            *self.current.lock().unwrap() = url.clone();
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.log(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.log(format!("select {}={}", selector, value));
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()> {
        self.log(format!("check {}={}", selector, checked));
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        self.log(format!("press {}={}", selector, key));
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        *self.backs.lock().unwrap() += 1;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.screenshots.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Which prompt an oracle call answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Plan,
    Extract,
    Decide,
    Refine,
    Synthesize,
    Interact,
    Other,
}

fn classify(system: &str) -> Call {
    if system.starts_with("You are a proactive web-scraping planner") {
        Call::Plan
    } else if system.starts_with("You are analyzing a web page") {
        Call::Extract
    } else if system.starts_with("You are given notes") {
        Call::Decide
    } else if system.starts_with("You are an expert search query refiner") {
        Call::Refine
    } else if system.starts_with("You are an expert synthesizer") {
        Call::Synthesize
    } else if system.starts_with("You help a web agent") {
        Call::Interact
    } else {
        Call::Other
    }
}

/// Oracle double routing each call by its system prompt
///
/// Planner replies come from a queue (FINISH once drained), page judgements
/// are keyed by URL, refinement echoes the query, and interaction planning
/// fails unless scripted so the rule-based planner runs.
pub struct ScriptedOracle {
    plans: Mutex<VecDeque<String>>,
    judgements: Vec<(String, String)>,
    decision: String,
    synthesis: Option<String>,
    interaction_plan: Option<String>,
    pub calls: Mutex<Vec<Call>>,
    pub inputs: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(VecDeque::new()),
            judgements: Vec::new(),
            decision: r#"{"action": "final"}"#.to_string(),
            synthesis: None,
            interaction_plan: None,
            calls: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn plan(self, reply: &str) -> Self {
        self.plans.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn judge(mut self, url: &str, reply: &str) -> Self {
        self.judgements.push((url.to_string(), reply.to_string()));
        self
    }

    pub fn final_page(self, url: &str, output: &str) -> Self {
        let reply = serde_json::json!({
            "action": "final",
            "summary": format!("Answers the question: {}", output),
            "key_points": [output],
            "context": "",
            "output": output,
        })
        .to_string();
        self.judge(url, &reply)
    }

    pub fn irrelevant_page(self, url: &str) -> Self {
        let reply = r#"{"action": "next_url", "summary": "Unrelated page", "key_points": [], "context": "", "output": ""}"#;
        self.judge(url, reply)
    }

    pub fn decision(mut self, reply: &str) -> Self {
        self.decision = reply.to_string();
        self
    }

    pub fn synthesis(mut self, answer: &str) -> Self {
        self.synthesis = Some(answer.to_string());
        self
    }

    /// Reply to interaction planning; without one that call fails
    pub fn interaction_plan(mut self, reply: &str) -> Self {
        self.interaction_plan = Some(reply.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// User messages of every call of kind `call`
    pub fn inputs_for(&self, call: Call) -> Vec<String> {
        let calls = self.calls();
        let inputs = self.inputs.lock().unwrap();
        calls
            .iter()
            .zip(inputs.iter())
            .filter(|(c, _)| **c == call)
            .map(|(_, input)| input.clone())
            .collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, messages: &[ChatMessage], _format: ResponseFormat) -> Result<String> {
        let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
        let user = messages.get(1).map(|m| m.content.as_str()).unwrap_or_default();
        let call = classify(system);
        self.calls.lock().unwrap().push(call);
        self.inputs.lock().unwrap().push(user.to_string());

        match call {
            Call::Plan => Ok(self
                .plans
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| r#"{"action": "FINISH"}"#.to_string())),
            Call::Extract => {
                let reply = self
                    .judgements
                    .iter()
                    .find(|(url, _)| user.contains(&format!("URL: {}\n", url)))
                    .map(|(_, reply)| reply.clone());
                Ok(reply.unwrap_or_else(|| {
                    r#"{"action": "next_url", "summary": "", "key_points": [], "context": "", "output": ""}"#
                        .to_string()
                }))
            }
            Call::Decide => Ok(self.decision.clone()),
            Call::Refine => Ok(user.trim_start_matches("Original query: ").to_string()),
            Call::Synthesize => self.synthesis.clone().ok_or_else(|| OracleError::EmptyReply.into()),
            Call::Interact => self.interaction_plan.clone().ok_or_else(|| OracleError::EmptyReply.into()),
            Call::Other => Err(OracleError::EmptyReply.into()),
        }
    }
}

/// Test config: fake search endpoint, no output files, small budgets
pub fn test_config() -> AgentConfig {
    AgentConfig::builder()
        .search_url(SEARCH_BASE)
        .output_dir(None)
        .max_interaction_time(Duration::from_secs(2))
        .build()
}

/// Agent over the doubles with settle pauses disabled
pub fn agent(page: &Arc<MockPage>, oracle: &Arc<ScriptedOracle>, config: AgentConfig) -> Agent {
    let explorer = InteractionExplorer::new(config.max_interaction_time)
        .with_oracle(oracle.clone())
        .with_settle_delay(Duration::ZERO);
    Agent::new(page.clone(), oracle.clone(), config).with_explorer(explorer)
}
