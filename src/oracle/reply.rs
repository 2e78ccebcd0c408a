//! Oracle reply parsing
//!
//! Models wrap JSON in markdown fences or surround it with prose often
//! enough that every structured call goes through [`parse_json_reply`].

use crate::error::OracleError;
use serde::de::DeserializeOwned;

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse a reply into `T`, tolerating fences and leading/trailing prose
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
    let body = strip_code_fence(raw);

    match serde_json::from_str::<T>(body) {
        Ok(value) => Ok(value),
        Err(first) => {
            // Fall back to the outermost object embedded in the text
            let start = body.find('{');
            let end = body.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if e > s => serde_json::from_str::<T>(&body[s..=e])
                    .map_err(|e| OracleError::MalformedReply(e.to_string())),
                _ => Err(OracleError::MalformedReply(first.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct ActionReply {
        action: String,
    }

    #[test]
    fn test_plain_json() {
        let p: ActionReply = parse_json_reply(r#"{"action":"EXTRACT"}"#).unwrap();
        assert_eq!(p.action, "EXTRACT");
    }

    #[test]
    fn test_fenced_json() {
        let raw = "```json\n{\"action\": \"SEARCH\"}\n```";
        let p: ActionReply = parse_json_reply(raw).unwrap();
        assert_eq!(p.action, "SEARCH");
    }

    #[test]
    fn test_bare_fence() {
        let raw = "```\n{\"action\": \"FINISH\"}\n```\n";
        assert_eq!(strip_code_fence(raw), "{\"action\": \"FINISH\"}");
    }

    #[test]
    fn test_prose_around_json() {
        let raw = "Sure! Here you go: {\"action\":\"NAVIGATE\"} Hope that helps.";
        let p: ActionReply = parse_json_reply(raw).unwrap();
        assert_eq!(p.action, "NAVIGATE");
    }

    #[test]
    fn test_truncated_json_is_malformed() {
        let err = parse_json_reply::<ActionReply>(r#"{"action": "NAVI"#).unwrap_err();
        assert!(matches!(err, OracleError::MalformedReply(_)));
    }

    #[test]
    fn test_non_json_is_malformed() {
        assert!(parse_json_reply::<ActionReply>("I think you should search.").is_err());
    }
}
