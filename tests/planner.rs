mod common;

use common::{generator, queries_json, tag, ScriptedBackend};
use deep_research::error::GenerationError;
use deep_research::research::QueryPlanner;
use std::sync::Arc;

#[tokio::test]
async fn plan_is_truncated_to_breadth() {
    let raw = queries_json(&["q1", "q2", "q3", "q4"]);
    let backend = Arc::new(ScriptedBackend::constant(&raw));
    let planner = QueryPlanner::new(generator(backend.clone()));

    let queries = planner.plan("impact of X", &[], 2).await.unwrap();

    let texts: Vec<&str> = queries.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(texts, vec!["q1", "q2"]);
    assert_eq!(queries[0].research_goal, "goal");
    assert_eq!(tag(&backend.prompts()[0], "prompt"), Some("impact of X"));
}

#[tokio::test]
async fn duplicate_and_blank_queries_are_skipped() {
    let raw = queries_json(&["solar output", "Solar Output ", "", "wind output"]);
    let backend = Arc::new(ScriptedBackend::constant(&raw));
    let planner = QueryPlanner::new(generator(backend));

    let queries = planner.plan("energy", &[], 3).await.unwrap();

    let texts: Vec<&str> = queries.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(texts, vec!["solar output", "wind output"]);
}

#[tokio::test]
async fn prior_learnings_are_passed_to_the_backend() {
    let backend = Arc::new(ScriptedBackend::constant(&queries_json(&["q1"])));
    let planner = QueryPlanner::new(generator(backend.clone()));

    let prior = vec!["Acme was founded in 1999".to_string()];
    planner.plan("acme history", &prior, 2).await.unwrap();

    let prompt = &backend.prompts()[0];
    assert!(prompt.contains("learnings from previous research"));
    assert!(prompt.contains("Acme was founded in 1999"));
    assert!(prompt.contains("Return a maximum of 2 queries"));
}

#[tokio::test]
async fn invalid_plan_surfaces_a_validation_error() {
    let backend = Arc::new(ScriptedBackend::constant(r#"{"queries": "none"}"#));
    let planner = QueryPlanner::new(generator(backend.clone()));

    let err = planner.plan("anything", &[], 2).await.unwrap_err();

    assert!(matches!(err, GenerationError::Validation { attempts: 3, .. }));
    assert_eq!(backend.calls(), 3);
}
