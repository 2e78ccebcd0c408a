//! Interaction module tests
//!
//! Run the explorer against a scripted page: budgets, the click safety
//! filter, search submission and the oracle/rules planning split.

mod common;

use common::{article, element, selector, Call, MockPage, ScriptedOracle};
use minion_web::interaction::{InteractionExplorer, InteractionOp, InteractionStep};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PAGE: &str = "https://www.insee.fr/en/statistiques";

fn loaded(elements: serde_json::Value) -> MockPage {
    let page = MockPage::new()
        .with_page(PAGE, article("Statistics", "Regional statistics."))
        .with_elements(PAGE, elements);
    page.load(PAGE);
    page
}

fn explorer(budget: Duration) -> InteractionExplorer {
    InteractionExplorer::new(budget).with_settle_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_budget_ends_exploration_immediately() {
    let page = loaded(json!([element(0, "a", "", "Population statistics")]))
        .with_click_delay(Duration::from_secs(5));
    let started = Instant::now();

    let report = explorer(Duration::from_millis(200))
        .explore(&page, "population statistics")
        .await;

    assert!(report.timed_out);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(page.ops().is_empty());
    assert_eq!(report.actions_performed, vec!["Scrolled down the page".to_string()]);
    assert_eq!(report.elements_found.clickable, 1);
}

#[tokio::test]
async fn test_irreversible_clicks_are_refused() {
    let page = loaded(json!([
        element(0, "button", "", "Buy now"),
        element(1, "a", "", "Read more")
    ]));
    let steps = vec![
        InteractionStep::new(&selector(0), InteractionOp::Click, None),
        // Unknown selectors are judged by the selector text itself
        InteractionStep::new("#checkout", InteractionOp::Click, None),
        InteractionStep::new(&selector(1), InteractionOp::Click, None),
    ];

    let report = explorer(Duration::from_secs(2)).apply(&page, &steps).await;

    assert_eq!(page.ops(), vec![format!("click {}", selector(1))]);
    assert_eq!(report.actions_performed, vec!["Clicked on element: Read more".to_string()]);
    assert!(!report.timed_out);
}

#[tokio::test]
async fn test_enter_only_on_search_fields() {
    let page = loaded(json!([
        element(0, "input", "search", "Search the site"),
        element(1, "textarea", "", "Comment")
    ]));
    let submit = |id: usize| InteractionStep {
        submit: true,
        ..InteractionStep::new(&selector(id), InteractionOp::Fill, Some("Lyon".to_string()))
    };

    let report = explorer(Duration::from_secs(2)).apply(&page, &[submit(0), submit(1)]).await;

    assert_eq!(
        page.ops(),
        vec![
            format!("fill {}=Lyon", selector(0)),
            format!("press {}=Enter", selector(0)),
            format!("fill {}=Lyon", selector(1)),
        ]
    );
    assert_eq!(report.actions_performed.len(), 3);
    assert_eq!(report.actions_performed[1], "Submitted search form");
}

#[tokio::test]
async fn test_oracle_plan_limited_to_discovered_selectors() {
    let page = loaded(json!([
        element(0, "a", "", "Home"),
        element(1, "input", "checkbox", "Include overseas regions")
    ]));
    let plan = json!({
        "interactions": [
            {"selector": "#ghost", "type": "click"},
            {"selector": selector(1), "type": "check"}
        ]
    });
    let oracle = Arc::new(ScriptedOracle::new().interaction_plan(&plan.to_string()));

    let report = explorer(Duration::from_secs(2))
        .with_oracle(oracle.clone())
        .explore(&page, "population of France")
        .await;

    assert_eq!(oracle.count(Call::Interact), 1);
    assert!(oracle.inputs_for(Call::Interact)[0].contains("Include overseas regions"));
    assert_eq!(page.ops(), vec![format!("check {}=true", selector(1))]);
    assert_eq!(report.elements_found.toggles, 1);
}

#[tokio::test]
async fn test_unusable_oracle_plan_falls_back_to_rules() {
    let page = loaded(json!([
        element(0, "a", "", "Home"),
        element(1, "a", "", "Population by region")
    ]));
    let plan = json!({"interactions": [{"selector": "#ghost", "type": "click"}]});
    let oracle = Arc::new(ScriptedOracle::new().interaction_plan(&plan.to_string()));

    explorer(Duration::from_secs(2))
        .with_oracle(oracle)
        .explore(&page, "population by region")
        .await;

    assert_eq!(page.ops(), vec![format!("click {}", selector(1))]);
}

#[tokio::test]
async fn test_failed_oracle_call_falls_back_to_rules() {
    let page = loaded(json!([
        element(0, "input", "checkbox", "Subscribe to our newsletter"),
        element(1, "input", "checkbox", "I agree to the terms")
    ]));
    let oracle = Arc::new(ScriptedOracle::new());

    let report = explorer(Duration::from_secs(2))
        .with_oracle(oracle.clone())
        .explore(&page, "regional data")
        .await;

    assert_eq!(oracle.count(Call::Interact), 1);
    // Unchecked marketing boxes stay alone, consent gets ticked
    assert_eq!(page.ops(), vec![format!("check {}=true", selector(1))]);
    assert!(report.actions_performed.contains(&"Checked \"I agree to the terms\"".to_string()));
}

#[tokio::test]
async fn test_page_without_elements_only_scrolls() {
    let page = MockPage::new().with_page(PAGE, article("Statistics", "Regional statistics."));
    page.load(PAGE);

    let report = explorer(Duration::from_secs(2)).explore(&page, "anything").await;

    assert!(page.ops().is_empty());
    assert_eq!(report.actions_performed, vec!["Scrolled down the page".to_string()]);
    assert!(!report.timed_out);
}
