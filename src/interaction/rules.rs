//! Rule-based interaction planning
//!
//! Used whenever no oracle is available or its plan is unusable. Scores
//! are plain keyword overlap between the goal and element labels.

use crate::interaction::elements::{ElementDescriptor, ElementKind};
use crate::interaction::explorer::{InteractionOp, InteractionStep};

/// Labels that suggest revealing more content
const AFFORDANCES: [&str; 6] = ["next", "continue", "more", "show", "view", "read"];

/// Labels that must never be clicked
const IRREVERSIBLE: [&str; 16] = [
    "buy",
    "purchase",
    "checkout",
    "check out",
    "pay",
    "pay now",
    "order",
    "place order",
    "add to cart",
    "delete",
    "remove",
    "sign out",
    "log out",
    "logout",
    "unsubscribe",
    "submit",
];

const CONSENT: [&str; 6] = ["i agree", "agree", "accept", "terms", "consent", "i have read"];

const MARKETING: [&str; 7] = [
    "newsletter",
    "marketing",
    "promotional",
    "promotions",
    "offers",
    "partners",
    "subscribe",
];

const STOPWORDS: [&str; 24] = [
    "the", "and", "for", "with", "what", "which", "who", "when", "where", "how", "are", "was",
    "were", "is", "of", "in", "on", "to", "a", "an", "from", "about", "find", "me",
];

/// Characters of the goal typed into a text input
pub const FILL_CHARS: usize = 50;

/// Lowercased content words of the goal
pub fn keywords(goal: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in tokens(goal) {
        if word.chars().count() >= 3 && !STOPWORDS.contains(&word.as_str()) && !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

/// Number of goal keywords present in `label`
pub fn overlap(keywords: &[String], label: &str) -> usize {
    let label = label.to_lowercase();
    keywords.iter().filter(|k| label.contains(k.as_str())).count()
}

/// Whether clicking something labelled `label` could not be undone
pub fn is_irreversible(label: &str) -> bool {
    contains_any_phrase(label, &IRREVERSIBLE)
}

fn is_affordance(label: &str) -> bool {
    contains_any_phrase(label, &AFFORDANCES)
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_any_phrase(label: &str, phrases: &[&str]) -> bool {
    let words = tokens(label);
    phrases.iter().any(|phrase| {
        let needle: Vec<&str> = phrase.split_whitespace().collect();
        !needle.is_empty()
            && words
                .windows(needle.len())
                .any(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
    })
}

/// Score of a clickable element; zero means "leave it alone"
pub fn click_score(keywords: &[String], element: &ElementDescriptor) -> usize {
    if !element.kind.is_clickable() || !element.visible || element.label.trim().is_empty() {
        return 0;
    }
    if is_irreversible(&element.label) {
        return 0;
    }
    let boost = usize::from(is_affordance(&element.label));
    overlap(keywords, &element.label) * 2 + boost
}

/// Goal-driven plan over the discovered elements
pub fn plan(goal: &str, elements: &[ElementDescriptor]) -> Vec<InteractionStep> {
    let keywords = keywords(goal);
    let visible: Vec<&ElementDescriptor> = elements.iter().filter(|e| e.visible).collect();
    let mut steps = Vec::new();

    for el in visible.iter().filter(|e| e.kind == ElementKind::Checkbox) {
        if let Some(step) = checkbox_step(&keywords, el) {
            steps.push(step);
        }
    }

    if let Some(radio) = visible
        .iter()
        .filter(|e| e.kind == ElementKind::Radio && e.checked != Some(true))
        .map(|e| (overlap(&keywords, &e.label), *e))
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score)
        .map(|(_, e)| e)
    {
        steps.push(InteractionStep::new(&radio.selector, InteractionOp::Check, None));
    }

    for el in visible.iter().filter(|e| e.kind == ElementKind::Select) {
        if let Some(option) = best_option(&keywords, el) {
            steps.push(InteractionStep::new(&el.selector, InteractionOp::Select, Some(option)));
        }
    }

    let mut submitted = false;
    if let Some(input) = visible.iter().find(|e| e.is_text_input()) {
        let query: String = goal.chars().take(FILL_CHARS).collect();
        let mut step = InteractionStep::new(&input.selector, InteractionOp::Fill, Some(query));
        if input.is_search_field() {
            step.submit = true;
            submitted = true;
        }
        steps.push(step);
    }

    // A submitted search replaces the page, so nothing left to click
    if !submitted {
        let best = visible
            .iter()
            .map(|e| (click_score(&keywords, e), *e))
            .filter(|(score, _)| *score > 0)
            .fold(None::<(usize, &ElementDescriptor)>, |best, cur| match best {
                Some(b) if b.0 >= cur.0 => Some(b),
                _ => Some(cur),
            });
        if let Some((_, el)) = best {
            steps.push(InteractionStep::new(&el.selector, InteractionOp::Click, None));
        }
    }

    steps
}

fn checkbox_step(keywords: &[String], el: &ElementDescriptor) -> Option<InteractionStep> {
    let checked = el.checked.unwrap_or(false);
    if contains_any_phrase(&el.label, &MARKETING) {
        return checked.then(|| InteractionStep::new(&el.selector, InteractionOp::Uncheck, None));
    }
    if contains_any_phrase(&el.label, &CONSENT) {
        return (!checked).then(|| InteractionStep::new(&el.selector, InteractionOp::Check, None));
    }
    (!checked && overlap(keywords, &el.label) > 0)
        .then(|| InteractionStep::new(&el.selector, InteractionOp::Check, None))
}

fn best_option(keywords: &[String], el: &ElementDescriptor) -> Option<String> {
    let current = el.value.as_deref().unwrap_or_default();
    el.options
        .iter()
        .map(|o| (overlap(keywords, o), o))
        .filter(|(score, o)| *score > 0 && o.as_str() != current)
        .fold(None::<(usize, &String)>, |best, cur| match best {
            Some(b) if b.0 >= cur.0 => Some(b),
            _ => Some(cur),
        })
        .map(|(_, o)| o.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(id: &str, kind: ElementKind, label: &str) -> ElementDescriptor {
        ElementDescriptor {
            id: id.to_string(),
            selector: ElementDescriptor::selector_for(id),
            kind,
            label: label.to_string(),
            visible: true,
            value: None,
            checked: kind.is_toggle().then_some(false),
            input_type: (kind == ElementKind::Input).then(|| "text".to_string()),
            options: Vec::new(),
        }
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            keywords("What is the population of Paris in 2024?"),
            vec!["population".to_string(), "paris".to_string(), "2024".to_string()]
        );
    }

    #[test]
    fn test_irreversible_labels() {
        assert!(is_irreversible("Buy now"));
        assert!(is_irreversible("Proceed to Checkout"));
        assert!(is_irreversible("Log out"));
        assert!(is_irreversible("SUBMIT"));
        assert!(!is_irreversible("Display options"));
        assert!(!is_irreversible("Payment history report"));
        assert!(!is_irreversible("Read more"));
    }

    #[test]
    fn test_click_prefers_keyword_then_affordance() {
        let kw = keywords("paris population statistics");
        let elements = vec![
            element("0", ElementKind::Link, "Home"),
            element("1", ElementKind::Button, "Show more"),
            element("2", ElementKind::Link, "Population statistics"),
            element("3", ElementKind::Button, "Buy Paris population report"),
        ];
        assert_eq!(click_score(&kw, &elements[0]), 0);
        assert_eq!(click_score(&kw, &elements[1]), 1);
        assert_eq!(click_score(&kw, &elements[2]), 4);
        assert_eq!(click_score(&kw, &elements[3]), 0);

        let steps = plan("paris population statistics", &elements);
        assert_eq!(steps, vec![InteractionStep::new("[data-minion-id=\"2\"]", InteractionOp::Click, None)]);
    }

    #[test]
    fn test_search_field_is_filled_and_submitted() {
        let mut search = element("0", ElementKind::Input, "Search the site");
        search.input_type = Some("search".to_string());
        let elements = vec![search, element("1", ElementKind::Button, "Read more")];

        let steps = plan("capital of France", &elements);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].op, InteractionOp::Fill);
        assert_eq!(steps[0].value.as_deref(), Some("capital of France"));
        assert!(steps[0].submit);
    }

    #[test]
    fn test_plain_input_not_submitted() {
        let elements = vec![
            element("0", ElementKind::Input, "City"),
            element("1", ElementKind::Button, "Continue"),
        ];
        let goal = "x".repeat(80);
        let steps = plan(&goal, &elements);
        assert_eq!(steps[0].op, InteractionOp::Fill);
        assert_eq!(steps[0].value.as_ref().map(|v| v.len()), Some(FILL_CHARS));
        assert!(!steps[0].submit);
        assert_eq!(steps[1].op, InteractionOp::Click);
    }

    #[test]
    fn test_checkbox_semantics() {
        let kw = keywords("hotels with free parking");
        let consent = element("0", ElementKind::Checkbox, "I agree to the terms");
        let mut marketing = element("1", ElementKind::Checkbox, "Send me marketing offers");
        marketing.checked = Some(true);
        let filter = element("2", ElementKind::Checkbox, "Free parking");
        let unrelated = element("3", ElementKind::Checkbox, "Pets allowed");

        assert_eq!(checkbox_step(&kw, &consent).map(|s| s.op), Some(InteractionOp::Check));
        assert_eq!(checkbox_step(&kw, &marketing).map(|s| s.op), Some(InteractionOp::Uncheck));
        assert_eq!(checkbox_step(&kw, &filter).map(|s| s.op), Some(InteractionOp::Check));
        assert_eq!(checkbox_step(&kw, &unrelated), None);
    }

    #[test]
    fn test_select_best_option() {
        let mut select = element("0", ElementKind::Select, "Year");
        select.options = vec!["2022".to_string(), "2023".to_string(), "2024".to_string()];
        select.value = Some("2022".to_string());

        let steps = plan("inflation figures for 2024", &[select]);
        assert_eq!(
            steps,
            vec![InteractionStep::new(
                "[data-minion-id=\"0\"]",
                InteractionOp::Select,
                Some("2024".to_string())
            )]
        );
    }

    #[test]
    fn test_hidden_elements_ignored() {
        let mut link = element("0", ElementKind::Link, "Population data");
        link.visible = false;
        assert!(plan("population data", &[link]).is_empty());
    }
}
