use crate::error::GenerationError;
use crate::generation::{GenerateOptions, StructuredGenerator};
use crate::models::ResearchQuery;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize, JsonSchema)]
struct SerpQueries {
    /// List of SERP queries
    queries: Vec<ResearchQuery>,
}

/// Turns a topic plus prior learnings into at most `max_queries` search queries.
pub struct QueryPlanner {
    generator: Arc<StructuredGenerator>,
}

impl QueryPlanner {
    pub fn new(generator: Arc<StructuredGenerator>) -> Self {
        Self { generator }
    }

    pub async fn plan(
        &self,
        topic: &str,
        prior_learnings: &[String],
        max_queries: usize,
    ) -> Result<Vec<ResearchQuery>, GenerationError> {
        let prompt = planning_prompt(topic, prior_learnings, max_queries);
        let res = self
            .generator
            .generate::<SerpQueries>(&prompt, "Generate SERP queries", GenerateOptions::default())
            .await?;

        let returned = res.object.queries.len();
        let queries = dedupe_and_cap(res.object.queries, max_queries);
        info!("Created {} queries for '{}'", queries.len(), topic);
        debug!(returned, kept = queries.len(), "Planned queries");
        Ok(queries)
    }
}

fn planning_prompt(topic: &str, prior_learnings: &[String], max_queries: usize) -> String {
    let mut prompt = format!(
        r#"Given the following prompt from the user, generate a list of SERP queries to research the topic.

SEARCH STRATEGY:
- Start with official sources and press releases
- Include financial and business news sources
- Look for industry analysis and market reports
- Search for recent developments and contracts
- Include regulatory filings and official documents
- Look for interviews and presentations by the people involved

RESPONSE FORMAT:
Each query in the queries array MUST be an object with the following fields:
- query: The actual search query string
- researchGoal: The goal and research direction for this query
- verificationFocus: Key claims to verify from authoritative sources

Return a maximum of {max_queries} queries, but feel free to return less if the original prompt is clear. Make sure each query is unique and not similar to each other: <prompt>{topic}</prompt>"#
    );
    if !prior_learnings.is_empty() {
        prompt.push_str(&format!(
            "\n\nHere are some learnings from previous research, use them to generate more specific queries: {}",
            prior_learnings.join("\n")
        ));
    }
    prompt
}

/// Drops exact duplicates (trimmed, case-insensitive) and keeps the first
/// `max_queries` in backend order.
fn dedupe_and_cap(queries: Vec<ResearchQuery>, max_queries: usize) -> Vec<ResearchQuery> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .filter(|q| !q.text.trim().is_empty())
        .filter(|q| seen.insert(q.text.trim().to_lowercase()))
        .take(max_queries)
        .collect()
}
