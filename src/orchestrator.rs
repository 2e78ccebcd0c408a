//! Agent loop
//!
//! Ties search, navigation, extraction and interaction together around the
//! planner. Every iteration: snapshot the page's elements, ask for an
//! action, vet it, dispatch it and fold the observation into the session.
//! Nothing in here returns an error; the worst case is the no-outcome
//! sentinel answer.

use crate::browser::{PageDriver, UrlValidator};
use crate::config::{AgentConfig, AgentMode};
use crate::extraction::{ContentExtractor, ExtractionAction, ExtractionRecord};
use crate::interaction::{InteractionExplorer, InteractionReport, InteractionStep};
use crate::oracle::Oracle;
use crate::output::OutputWriter;
use crate::planner::{Context, Planner, PlannerAction, PlannerState, Session};
use crate::search::{refine_query, SearchService};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// FINISH was accepted (or a final page was found in sequential mode)
    Finished,
    /// The visited-URL cap was reached
    UrlBudgetExhausted,
    /// The iteration cap was reached
    StepBudgetExhausted,
    /// Nothing left to visit and no further result page
    NoMoreResults,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Finished => "finished",
            Self::UrlBudgetExhausted => "visited-URL budget exhausted",
            Self::StepBudgetExhausted => "step budget exhausted",
            Self::NoMoreResults => "no more results",
        };
        f.write_str(text)
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    /// Synthesized answer (or the no-outcome sentinel)
    pub answer: String,
    /// Why the loop stopped
    pub termination: TerminationReason,
    /// Everything the run accumulated
    pub context: Context,
    /// Iterations executed
    pub steps: usize,
}

/// Autonomous browsing agent
pub struct Agent {
    page: Arc<dyn PageDriver>,
    oracle: Arc<dyn Oracle>,
    config: AgentConfig,
    planner: Planner,
    extractor: ContentExtractor,
    explorer: InteractionExplorer,
    search: SearchService,
    output: Option<OutputWriter>,
}

impl Agent {
    /// Agent driving `page` with decisions from `oracle`
    pub fn new(page: Arc<dyn PageDriver>, oracle: Arc<dyn Oracle>, config: AgentConfig) -> Self {
        let planner = Planner::new(oracle.clone(), config.oracle_retries);
        let extractor = ContentExtractor::new(oracle.clone(), config.chunk_chars)
            .with_target_selector(config.target_selector.clone());
        let explorer = InteractionExplorer::new(config.max_interaction_time).with_oracle(oracle.clone());

        let mut search = SearchService::new(config.search_url.clone(), config.max_search_results);
        if config.screenshot_on_error {
            if let Some(dir) = &config.output_dir {
                search = search.with_error_screenshots(dir.clone());
            }
        }
        let output = config.output_dir.clone().map(OutputWriter::new);

        Self {
            page,
            oracle,
            config,
            planner,
            extractor,
            explorer,
            search,
            output,
        }
    }

    /// Replace the interaction explorer
    pub fn with_explorer(mut self, explorer: InteractionExplorer) -> Self {
        self.explorer = explorer;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Work on `goal` until an answer or a budget ends the run
    #[instrument(skip(self), fields(mode = ?self.config.mode))]
    pub async fn run(&mut self, goal: &str) -> AgentOutcome {
        info!("Starting task: {}", goal);
        let mut session = Session::new();

        let termination = match self.config.mode {
            AgentMode::Planned => self.run_planned(goal, &mut session).await,
            AgentMode::Sequential => self.run_sequential(goal, &mut session).await,
        };
        info!("Loop ended after {} steps: {}", session.steps, termination);

        let answer = match direct_answer(self.config.mode, termination, &session.context) {
            Some(answer) => answer,
            None => self.planner.generate_final_answer(goal, &session).await,
        };
        session.context.accept_final_answer(&answer);
        session.context.record(format!("Final answer ({})", termination));
        session.state = PlannerState::Finished;

        if let Some(output) = &self.output {
            output.save_run(&answer, &session.context).await;
        }

        AgentOutcome {
            answer,
            termination,
            steps: session.steps,
            context: session.context,
        }
    }

    async fn run_planned(&mut self, goal: &str, session: &mut Session) -> TerminationReason {
        loop {
            if let Some(reason) = self.stop_reason(session) {
                return reason;
            }

            if session.current_url.is_some() {
                session.page_elements = self.explorer.snapshot(self.page.as_ref()).await;
            }

            let proposed = self.planner.decide_next_action(goal, session).await;
            let action = self.planner.vet(proposed, session);
            session.context.record(format!("Step {}: {}", session.steps + 1, action));
            let previous = session.state;

            match action {
                PlannerAction::Finish { .. } => {
                    session.steps += 1;
                    return TerminationReason::Finished;
                }
                PlannerAction::Search { query } => self.search_step(goal, query, session).await,
                PlannerAction::Navigate { url } => self.navigate_step(goal, url, session).await,
                PlannerAction::Extract => self.extract_step(goal, session).await,
                PlannerAction::Interact { interactions } => {
                    self.interact_step(goal, &interactions, session).await
                }
            }
            session.steps += 1;

            // Two dead ends in a row: searching and paging both came up empty
            if session.state == PlannerState::NoMoreResults && previous == PlannerState::NoMoreResults {
                return TerminationReason::NoMoreResults;
            }
        }
    }

    async fn run_sequential(&mut self, goal: &str, session: &mut Session) -> TerminationReason {
        self.search_step(goal, None, session).await;

        loop {
            if let Some(reason) = self.stop_reason(session) {
                return reason;
            }

            let next = session.context.unvisited_results().next().map(|r| r.url.clone());
            match next {
                Some(url) => {
                    self.visit(goal, &url, session).await;
                    session.steps += 1;
                    if session.state == PlannerState::FinalAnswerFound {
                        return TerminationReason::Finished;
                    }
                }
                None => {
                    let more = self.search.next_page(self.page.as_ref()).await;
                    session.clear_page();
                    if session.context.merge_search_results(more) == 0 {
                        info!("No further search results available");
                        session.state = PlannerState::NoMoreResults;
                        return TerminationReason::NoMoreResults;
                    }
                    session.state = PlannerState::SearchResultsAvailable;
                }
            }
        }
    }

    fn stop_reason(&self, session: &Session) -> Option<TerminationReason> {
        if session.context.visited_urls().len() >= self.config.max_visited_urls {
            warn!("Reached max visited URLs ({}), stopping", self.config.max_visited_urls);
            return Some(TerminationReason::UrlBudgetExhausted);
        }
        if session.steps >= self.config.max_steps {
            warn!("Reached max steps ({}), stopping", self.config.max_steps);
            return Some(TerminationReason::StepBudgetExhausted);
        }
        None
    }

    async fn search_step(&mut self, goal: &str, query: Option<String>, session: &mut Session) {
        let raw = query.unwrap_or_else(|| goal.to_string());
        let refined = refine_query(self.oracle.as_ref(), &raw).await;
        session.context.add_search_query(&refined);

        let results = self.search.search(self.page.as_ref(), &refined).await;
        // The browser now shows the result page, not a content page
        session.clear_page();
        let found = results.len();
        let added = session.context.merge_search_results(results);

        session.state = if session.context.unvisited_results().next().is_some() {
            PlannerState::SearchResultsAvailable
        } else {
            PlannerState::NoMoreResults
        };
        session
            .context
            .record(format!("Searched \"{}\": {} results, {} new", refined, found, added));
    }

    async fn navigate_step(&mut self, goal: &str, url: Option<String>, session: &mut Session) {
        let target = match url {
            Some(url) => Some(url),
            None => self.next_candidate(session).await,
        };
        match target {
            Some(url) => self.visit(goal, &url, session).await,
            None => {
                warn!("No URL to navigate to and no more search results");
                session.state = PlannerState::NoMoreResults;
                session.context.record("Nothing left to navigate to");
            }
        }
    }

    /// First unvisited result, else one from the next result page, else a
    /// known result again
    async fn next_candidate(&mut self, session: &mut Session) -> Option<String> {
        if let Some(result) = session.context.unvisited_results().next() {
            return Some(result.url.clone());
        }

        if self.search.has_next_page() {
            let more = self.search.next_page(self.page.as_ref()).await;
            session.clear_page();
            if session.context.merge_search_results(more) > 0 {
                session.state = PlannerState::SearchResultsAvailable;
                if let Some(result) = session.context.unvisited_results().next() {
                    return Some(result.url.clone());
                }
            }
        }

        let reused = session.context.search_results().first().map(|r| r.url.clone());
        if let Some(url) = &reused {
            info!("All results visited, reusing {}", url);
        }
        reused
    }

    /// Load `url` and judge it
    async fn visit(&mut self, goal: &str, url: &str, session: &mut Session) {
        if !UrlValidator::is_absolute_http(url) {
            warn!("Refusing to navigate to {}", url);
            session.state = PlannerState::NavigationError;
            return;
        }
        let is_new = !session.context.is_visited(url);
        if is_new && session.context.visited_urls().len() >= self.config.max_visited_urls {
            warn!("Visited-URL budget spent, not opening {}", url);
            return;
        }
        // Failed URLs count too, so they are not retried forever
        session.context.add_visited_url(url);

        match self.page.goto(url).await {
            Ok(nav) => {
                debug!("Loaded {} in {}ms", nav.final_url, nav.duration_ms);
                // A redirect is the same visit; the page is known by where it landed
                let landed = if nav.final_url != url && UrlValidator::is_absolute_http(&nav.final_url) {
                    session.context.add_redirect(&nav.final_url);
                    session
                        .context
                        .record(format!("Navigated to {} (redirected to {})", url, nav.final_url));
                    nav.final_url
                } else {
                    session.context.record(format!("Navigated to {}", url));
                    url.to_string()
                };
                session.set_page(&landed);
                self.judge_current_page(goal, session).await;
            }
            Err(e) => {
                warn!("Navigation error for {}: {}. Going back.", url, e);
                if let Err(e) = self.page.go_back().await {
                    debug!("Could not go back: {}", e);
                }
                session.clear_page();
                session.state = PlannerState::NavigationError;
                session.context.record(format!("Navigation to {} failed", url));
            }
        }
    }

    async fn extract_step(&mut self, goal: &str, session: &mut Session) {
        let Some(url) = session.current_url.clone() else {
            warn!("Cannot extract, no current page");
            session.state = PlannerState::NoCurrentPage;
            return;
        };

        // Already judged and not answered: explore first, then judge again
        let needs_exploring = session
            .context
            .latest_extraction_for(&url)
            .is_some_and(|prev| !prev.is_final_candidate());
        if needs_exploring {
            let report = self.explorer.explore(self.page.as_ref(), goal).await;
            self.fold_interaction(&report, session).await;
        }

        self.judge_current_page(goal, session).await;
    }

    async fn interact_step(&mut self, goal: &str, steps: &[InteractionStep], session: &mut Session) {
        if session.current_url.is_none() {
            session.state = PlannerState::NoCurrentPage;
            return;
        }

        let report = if steps.is_empty() {
            self.explorer.explore(self.page.as_ref(), goal).await
        } else {
            self.explorer.apply(self.page.as_ref(), steps).await
        };
        self.fold_interaction(&report, session).await;

        if session.current_url.is_some() {
            self.judge_current_page(goal, session).await;
        }
    }

    /// Record a report and follow any navigation the interactions caused
    async fn fold_interaction(&mut self, report: &InteractionReport, session: &mut Session) {
        info!(
            "Interactions: {:?} (timed out: {})",
            report.actions_performed, report.timed_out
        );
        session.context.record(format!(
            "Interacted: {} actions{}",
            report.actions_performed.len(),
            if report.timed_out { ", timed out" } else { "" }
        ));

        let landed = self.page.current_url().await;
        let Some(current) = session.current_url.as_deref() else {
            return;
        };
        if landed == current || !UrlValidator::is_absolute_http(&landed) {
            return;
        }

        // Interactions only run while the visited count is below the cap
        if session.context.add_visited_url(&landed) {
            info!("Interaction moved to {}", landed);
        }
        session.context.record(format!("Interaction moved to {}", landed));
        session.current_url = Some(landed);
        session.page_elements.clear();
    }

    async fn judge_current_page(&mut self, goal: &str, session: &mut Session) {
        let Some(url) = session.current_url.clone() else {
            return;
        };
        let record = self.extractor.extract(self.page.as_ref(), goal).await;

        session.state = if record.action == ExtractionAction::Final {
            PlannerState::FinalAnswerFound
        } else if is_empty_record(&record) {
            PlannerState::ExtractionError
        } else {
            PlannerState::Extracted
        };
        session.context.record(format!("Extracted {}: {:?}", url, record.action));
        session.context.add_extraction(&url, record);
    }
}

fn is_empty_record(record: &ExtractionRecord) -> bool {
    record.summary.trim().is_empty() && record.key_points.is_empty() && record.output.trim().is_empty()
}

/// Sequential mode answers with the final page's output as-is
fn direct_answer(mode: AgentMode, termination: TerminationReason, context: &Context) -> Option<String> {
    if mode != AgentMode::Sequential || termination != TerminationReason::Finished {
        return None;
    }
    context
        .extractions()
        .iter()
        .rev()
        .find(|e| e.record.action == ExtractionAction::Final)
        .map(|e| e.record.output.trim().to_string())
        .filter(|o| !o.is_empty())
}
