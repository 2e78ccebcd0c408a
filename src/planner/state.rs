//! Planner states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the task stands after the last executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlannerState {
    /// Nothing has happened yet
    #[default]
    Initial,
    /// A search produced results to visit
    SearchResultsAvailable,
    /// A page loaded but was not judged yet
    PageLoaded,
    /// The current page was judged and did not answer the goal
    Extracted,
    /// An extraction answered the goal
    FinalAnswerFound,
    /// The last navigation failed
    NavigationError,
    /// The last extraction produced nothing usable
    ExtractionError,
    /// An action needed a page but none is loaded
    NoCurrentPage,
    /// No result left to visit and no further result page
    NoMoreResults,
    /// Terminal
    Finished,
}

impl PlannerState {
    /// Name shown to the oracle and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::SearchResultsAvailable => "SEARCH_RESULTS_AVAILABLE",
            Self::PageLoaded => "PAGE_LOADED",
            Self::Extracted => "EXTRACTED",
            Self::FinalAnswerFound => "FINAL_ANSWER_FOUND",
            Self::NavigationError => "NAVIGATION_ERROR",
            Self::ExtractionError => "EXTRACTION_ERROR",
            Self::NoCurrentPage => "NO_CURRENT_PAGE",
            Self::NoMoreResults => "NO_MORE_RESULTS",
            Self::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for PlannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
