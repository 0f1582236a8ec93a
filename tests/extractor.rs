mod common;

use common::{document, generator, learning_json, ScriptedBackend};
use deep_research::research::ContentExtractor;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn no_documents_means_no_backend_call() {
    let backend = Arc::new(ScriptedBackend::constant("{}"));
    let extractor = ContentExtractor::new(generator(backend.clone()));

    let extraction = extractor.extract("q", &[], 3, 3).await.unwrap();

    assert!(extraction.learnings.is_empty());
    assert!(extraction.follow_up_questions.is_empty());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn blank_documents_are_treated_as_missing() {
    let backend = Arc::new(ScriptedBackend::constant("{}"));
    let extractor = ContentExtractor::new(generator(backend.clone()));

    let docs = vec![document("https://a.test", "   "), document("https://b.test", "")];
    let extraction = extractor.extract("q", &docs, 3, 3).await.unwrap();

    assert_eq!(extraction, Default::default());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn unverified_learnings_are_dropped_and_caps_applied() {
    let raw = json!({
        "learnings": [
            learning_json("weak claim", "needs_verification"),
            learning_json("first solid fact", "verified"),
            learning_json("second solid fact", "likely"),
            learning_json("third solid fact", "verified"),
        ],
        "followUpQuestions": ["one?", "two?", "three?", "four?"]
    })
    .to_string();
    let backend = Arc::new(ScriptedBackend::constant(&raw));
    let extractor = ContentExtractor::new(generator(backend.clone()));

    let docs = vec![document("https://a.test", "Acme annual report")];
    let extraction = extractor.extract("acme revenue", &docs, 2, 3).await.unwrap();

    let facts: Vec<&str> = extraction.learnings.iter().map(|l| l.fact.as_str()).collect();
    assert_eq!(facts, vec!["first solid fact", "second solid fact"]);
    assert_eq!(extraction.follow_up_questions, vec!["one?", "two?", "three?"]);
    assert_eq!(backend.calls(), 1);

    let prompt = &backend.prompts()[0];
    assert!(prompt.contains("<query>acme revenue</query>"));
    assert!(prompt.contains("<content>\nAcme annual report\n</content>"));
}

#[tokio::test]
async fn annotated_learnings_carry_provenance() {
    let raw = json!({
        "learnings": [learning_json("Acme employs 500 people", "verified")],
        "followUpQuestions": []
    })
    .to_string();
    let backend = Arc::new(ScriptedBackend::constant(&raw));
    let extractor = ContentExtractor::new(generator(backend));

    let docs = vec![document("https://a.test", "Acme careers page")];
    let extraction = extractor.extract("acme staff", &docs, 3, 3).await.unwrap();

    assert_eq!(
        extraction.annotated_learnings(),
        vec!["Acme employs 500 people [Verified by 2 news source(s) as of 2024-01-01]"]
    );
}
