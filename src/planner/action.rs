//! Planner actions
//!
//! The oracle picks one action per iteration as a small JSON object. The
//! string-typed `action` field becomes a closed enum here; unknown names
//! fall back to [`PlannerAction::Extract`].

use crate::error::OracleError;
use crate::interaction::InteractionStep;
use crate::oracle::parse_json_reply;
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// One step of the plan
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerAction {
    /// Run a search; `None` searches for the goal itself
    Search {
        /// Query text
        query: Option<String>,
    },
    /// Load a page; `None` lets the agent pick the next result
    Navigate {
        /// Target URL
        url: Option<String>,
    },
    /// Judge the current page
    Extract,
    /// Operate elements of the current page
    Interact {
        /// Operations in order
        interactions: Vec<InteractionStep>,
    },
    /// Stop and synthesize the answer
    Finish {
        /// Answer text offered by the oracle, if any
        answer: Option<String>,
    },
}

impl PlannerAction {
    /// Vocabulary name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search { .. } => "SEARCH",
            Self::Navigate { .. } => "NAVIGATE",
            Self::Extract => "EXTRACT",
            Self::Interact { .. } => "INTERACT",
            Self::Finish { .. } => "FINISH",
        }
    }

    /// Parse a raw oracle reply
    pub fn parse(raw: &str) -> Result<Self, OracleError> {
        let value: Value = parse_json_reply(raw)?;
        Self::from_value(&value)
    }

    /// Build from a decoded reply; only a missing `action` is an error
    pub fn from_value(value: &Value) -> Result<Self, OracleError> {
        let name = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| OracleError::MalformedReply("missing 'action'".to_string()))?;

        let action = match name.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SEARCH" => Self::Search {
                query: text(value, "query"),
            },
            "NAVIGATE" => Self::Navigate {
                url: text(value, "url"),
            },
            "EXTRACT" => Self::Extract,
            "INTERACT" | "PAGE_INTERACTIONS" | "PAGE_INTERACTION" => Self::Interact {
                interactions: InteractionStep::parse_list(&value["interactions"]),
            },
            "FINISH" => Self::Finish {
                answer: text(value, "answer"),
            },
            other => {
                warn!("Unknown planner action '{}', extracting instead", other);
                Self::Extract
            }
        };
        Ok(action)
    }
}

impl fmt::Display for PlannerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search { query: Some(q) } => write!(f, "SEARCH \"{}\"", q),
            Self::Navigate { url: Some(u) } => write!(f, "NAVIGATE {}", u),
            Self::Interact { interactions } => write!(f, "INTERACT ({} steps)", interactions.len()),
            other => f.write_str(other.name()),
        }
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionOp;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_navigate() {
        let action = PlannerAction::parse(r#"{"action":"NAVIGATE","url":"https://example.org/x"}"#).unwrap();
        assert_eq!(
            action,
            PlannerAction::Navigate {
                url: Some("https://example.org/x".to_string())
            }
        );
    }

    #[test]
    fn test_parse_case_insensitive_and_fenced() {
        let action = PlannerAction::parse("```json\n{\"action\": \"search\", \"query\": \"  capital of France \"}\n```").unwrap();
        assert_eq!(
            action,
            PlannerAction::Search {
                query: Some("capital of France".to_string())
            }
        );
    }

    #[test]
    fn test_page_interactions_alias() {
        let raw = r##"{"action":"PAGE_INTERACTIONS","interactions":[{"selector":"#q","type":"fill","value":"Paris"}]}"##;
        match PlannerAction::parse(raw).unwrap() {
            PlannerAction::Interact { interactions } => {
                assert_eq!(interactions.len(), 1);
                assert_eq!(interactions[0].op, InteractionOp::Fill);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_falls_back_to_extract() {
        assert_eq!(PlannerAction::parse(r#"{"action":"SCROLL"}"#).unwrap(), PlannerAction::Extract);
    }

    #[test]
    fn test_malformed_replies() {
        assert!(PlannerAction::parse(r#"{"action": "NAVI"#).is_err());
        assert!(PlannerAction::parse(r#"{"url": "https://a.org"}"#).is_err());
        assert!(PlannerAction::parse("navigate somewhere").is_err());
    }

    #[test]
    fn test_empty_fields_become_none() {
        let action = PlannerAction::parse(r#"{"action":"NAVIGATE","url":""}"#).unwrap();
        assert_eq!(action, PlannerAction::Navigate { url: None });
        assert_eq!(action.to_string(), "NAVIGATE");
    }
}
