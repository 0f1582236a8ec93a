use crate::error::SearchError;
use crate::models::{Document, SearchResponse};
use crate::tools::SearchClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const FIRECRAWL_SEARCH_ENDPOINT: &str = "https://api.firecrawl.dev/v1/search";

#[derive(Debug, Clone)]
pub struct FirecrawlSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    limit: u32,
    timeout: Duration,
}

impl FirecrawlSearch {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: FIRECRAWL_SEARCH_ENDPOINT.to_string(),
            limit: 5,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchClient for FirecrawlSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        if self.api_key.trim().is_empty() {
            return Err(SearchError::NotConfigured(
                "FIRECRAWL_API_KEY is empty".to_string(),
            ));
        }

        let body = serde_json::json!({
            "query": query,
            "limit": self.limit,
            "timeout": self.timeout.as_millis() as u64,
            "scrapeOptions": { "formats": ["markdown"] }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
            });
        }

        let parsed: FirecrawlSearchResponse = response.json().await?;
        if !parsed.success {
            return Err(SearchError::Request(
                "firecrawl search returned success=false".to_string(),
            ));
        }
        debug!("Firecrawl returned {} items for '{}'", parsed.data.len(), query);
        Ok(into_search_response(parsed))
    }
}

#[derive(Debug, Deserialize)]
struct FirecrawlSearchResponse {
    success: bool,
    #[serde(default)]
    data: Vec<FirecrawlItem>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlItem {
    url: Option<String>,
    markdown: Option<String>,
    description: Option<String>,
}

/// Items without a URL are dropped. Items without markdown fall back to the
/// description, then to an empty body, so the URL still counts as visited.
fn into_search_response(parsed: FirecrawlSearchResponse) -> SearchResponse {
    let documents = parsed
        .data
        .into_iter()
        .filter_map(|item| {
            let url = item.url?;
            let content = item.markdown.or(item.description).unwrap_or_default();
            Some(Document { url, content })
        })
        .collect();
    SearchResponse { documents }
}
