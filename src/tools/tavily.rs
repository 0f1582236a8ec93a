use crate::error::SearchError;
use crate::models::{Document, SearchResponse};
use crate::tools::SearchClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

#[derive(Debug, Clone, Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    include_raw_content: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: TAVILY_ENDPOINT.to_string(),
            max_results: 5,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchClient for TavilySearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        if self.api_key.trim().is_empty() {
            return Err(SearchError::NotConfigured("TAVILY_API_KEY is empty".to_string()));
        }

        let request = TavilySearchRequest {
            query,
            max_results: self.max_results,
            search_depth: "advanced",
            include_raw_content: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
            });
        }

        let parsed: TavilySearchResponse = response.json().await?;
        debug!("Tavily returned {} results for '{}'", parsed.results.len(), query);
        Ok(into_search_response(parsed))
    }
}

fn into_search_response(parsed: TavilySearchResponse) -> SearchResponse {
    let documents = parsed
        .results
        .into_iter()
        .map(|r| Document {
            url: r.url,
            content: r
                .raw_content
                .filter(|raw| !raw.trim().is_empty())
                .unwrap_or(r.content),
        })
        .collect();
    SearchResponse { documents }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_content_wins_over_snippet() {
        let js = r#"{
            "results": [
                {"title": "A", "url": "https://a.example", "content": "snippet", "raw_content": "full page", "score": 0.9},
                {"title": "B", "url": "https://b.example", "content": "only snippet", "raw_content": null, "score": 0.5}
            ]
        }"#;
        let parsed: TavilySearchResponse = serde_json::from_str(js).unwrap();
        let response = into_search_response(parsed);
        assert_eq!(response.documents.len(), 2);
        assert_eq!(response.documents[0].content, "full page");
        assert_eq!(response.documents[1].content, "only snippet");
    }

    #[test]
    fn missing_results_is_an_empty_response() {
        let parsed: TavilySearchResponse = serde_json::from_str("{}").unwrap();
        assert!(into_search_response(parsed).documents.is_empty());
    }
}
