mod common;

use axum::routing::post;
use axum::{Json, Router};
use common::{fast_policy, serve};
use deep_research::error::GenerationError;
use deep_research::generation::{GenerateOptions, StructuredGenerator};
use deep_research::tools::llm::RigBackend;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
struct Questions {
    questions: Vec<String>,
}

fn chat_completion(content: Value) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "logprobs": null,
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

/// OpenAI-compatible endpoint answering every chat completion with `reply`.
async fn openai_mock(reply: Value, hits: Arc<AtomicUsize>) -> String {
    let handler = move || {
        let reply = reply.clone();
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Json(reply)
        }
    };
    let router = Router::new()
        .route("/chat/completions", post(handler.clone()))
        .route("/v1/chat/completions", post(handler));
    serve(router).await
}

fn generator_for(base_url: &str) -> StructuredGenerator {
    let backend = Arc::new(RigBackend::new("sk-test", "gpt-4o-mini", Some(base_url)));
    StructuredGenerator::new(backend).with_retry_policy(fast_policy())
}

#[tokio::test]
async fn null_message_content_fails_without_retrying() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = openai_mock(chat_completion(Value::Null), hits.clone()).await;

    let err = generator_for(&base)
        .generate::<Questions>("Ask questions", "Generate feedback questions", GenerateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::NoContent { .. }), "{err}");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn json_message_content_is_validated() {
    let hits = Arc::new(AtomicUsize::new(0));
    let content = json!(r#"{"questions": ["Which region?"]}"#);
    let base = openai_mock(chat_completion(content), hits.clone()).await;

    let res = generator_for(&base)
        .generate::<Questions>("Ask questions", "Generate feedback questions", GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(res.object.questions, vec!["Which region?"]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
