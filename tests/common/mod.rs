//! Shared fakes for the integration tests: a scripted completion backend and
//! a map-backed search client.
#![allow(dead_code)]

use async_trait::async_trait;
use deep_research::error::{BackendError, SearchError};
use deep_research::generation::{RetryPolicy, StructuredGenerator};
use deep_research::models::{Document, SearchResponse};
use deep_research::tools::llm::{CompletionBackend, CompletionRequest, CompletionResponse};
use deep_research::tools::SearchClient;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler =
    dyn Fn(&CompletionRequest, usize) -> Result<CompletionResponse, BackendError> + Send + Sync;

/// Completion backend driven by a closure over the request and the zero
/// based call index.
pub struct ScriptedBackend {
    handler: Box<Handler>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    delay: Option<(Duration, usize)>,
}

impl ScriptedBackend {
    pub fn new(
        handler: impl Fn(&CompletionRequest, usize) -> Result<CompletionResponse, BackendError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Always answers with the same raw text.
    pub fn constant(raw: &str) -> Self {
        let raw = raw.to_string();
        Self::new(move |_, _| Ok(CompletionResponse::text(raw.clone())))
    }

    /// Sleeps for `delay` before answering the first `slow_calls` calls.
    pub fn with_delay(mut self, delay: Duration, slow_calls: usize) -> Self {
        self.delay = Some((delay, slow_calls));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_containing(&self, marker: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(marker)).count()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.user_prompt.clone());
        if let Some((delay, slow_calls)) = self.delay {
            if index < slow_calls {
                tokio::time::sleep(delay).await;
            }
        }
        (self.handler)(request, index)
    }
}

pub const PLANNER_MARKER: &str = "generate a list of SERP queries";
pub const EXTRACTOR_MARKER: &str = "Given the following contents from a SERP search";
pub const REPORT_MARKER: &str = "write a final report";
pub const FEEDBACK_MARKER: &str = "clarify the research direction";

/// Text between the first `<name>` and the following `</name>`.
pub fn tag<'a>(prompt: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = prompt.find(&open)? + open.len();
    let end = prompt[start..].find(&close)? + start;
    Some(&prompt[start..end])
}

pub fn queries_json(queries: &[&str]) -> String {
    let queries: Vec<_> = queries
        .iter()
        .map(|q| json!({"query": q, "researchGoal": "goal", "verificationFocus": "focus"}))
        .collect();
    json!({ "queries": queries }).to_string()
}

pub fn learning_json(fact: &str, confidence: &str) -> serde_json::Value {
    json!({
        "fact": fact,
        "sourcesCount": 2,
        "sourceTypes": ["news"],
        "confidenceLevel": confidence,
        "dateVerified": "2024-01-01"
    })
}

pub fn extraction_json(facts: &[&str], follow_ups: &[&str]) -> String {
    let learnings: Vec<_> = facts.iter().map(|f| learning_json(f, "verified")).collect();
    json!({ "learnings": learnings, "followUpQuestions": follow_ups }).to_string()
}

pub fn ok(raw: String) -> Result<CompletionResponse, BackendError> {
    Ok(CompletionResponse::text(raw))
}

/// Backend that answers every research prompt kind. `planner` maps a topic to
/// query texts; `extractor` maps a search query to (facts, follow-ups).
pub fn research_backend(
    planner: impl Fn(&str) -> Vec<String> + Send + Sync + 'static,
    extractor: impl Fn(&str) -> Result<(Vec<String>, Vec<String>), BackendError>
        + Send
        + Sync
        + 'static,
) -> ScriptedBackend {
    ScriptedBackend::new(move |request, _| {
        let prompt = request.user_prompt.as_str();
        if prompt.contains(PLANNER_MARKER) {
            let topic = tag(prompt, "prompt").unwrap_or_default();
            let queries = planner(topic);
            let refs: Vec<&str> = queries.iter().map(String::as_str).collect();
            ok(queries_json(&refs))
        } else if prompt.contains(EXTRACTOR_MARKER) {
            let query = tag(prompt, "query").unwrap_or_default();
            let (facts, follow_ups) = extractor(query)?;
            let facts: Vec<&str> = facts.iter().map(String::as_str).collect();
            let follow_ups: Vec<&str> = follow_ups.iter().map(String::as_str).collect();
            ok(extraction_json(&facts, &follow_ups))
        } else if prompt.contains(REPORT_MARKER) {
            ok(json!({ "reportMarkdown": "# Report\n\nFindings." }).to_string())
        } else if prompt.contains(FEEDBACK_MARKER) {
            ok(json!({ "questions": ["Which region?", "Which period?", "Which sector?"] })
                .to_string())
        } else {
            Err(BackendError::Fatal("unexpected prompt".to_string()))
        }
    })
}

/// Search client that answers one document per query unless told otherwise.
#[derive(Default)]
pub struct MapSearch {
    overrides: HashMap<String, Result<Vec<Document>, String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MapSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(mut self, query: &str, documents: Vec<Document>) -> Self {
        self.overrides.insert(query.to_string(), Ok(documents));
        self
    }

    pub fn with_failure(mut self, query: &str, message: &str) -> Self {
        self.overrides
            .insert(query.to_string(), Err(message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn url_for(query: &str) -> String {
    format!("https://search.test/{}", query.replace(' ', "-"))
}

pub fn document(url: &str, content: &str) -> Document {
    Document {
        url: url.to_string(),
        content: content.to_string(),
    }
}

#[async_trait]
impl SearchClient for MapSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.overrides.get(query) {
            Some(Ok(documents)) => Ok(SearchResponse {
                documents: documents.clone(),
            }),
            Some(Err(message)) => Err(SearchError::Request(message.clone())),
            None => Ok(SearchResponse {
                documents: vec![document(&url_for(query), &format!("Content about {query}"))],
            }),
        }
    }
}

/// Default policy scaled down to milliseconds, without jitter.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        initial_wait: Duration::from_millis(1),
        max_wait: Duration::from_millis(8),
        jitter_max: Duration::ZERO,
        validation_retries: 2,
        validation_pause: Duration::from_millis(1),
    }
}

pub fn generator(backend: Arc<ScriptedBackend>) -> Arc<StructuredGenerator> {
    Arc::new(StructuredGenerator::new(backend).with_retry_policy(fast_policy()))
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
