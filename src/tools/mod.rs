pub mod firecrawl;
pub mod llm;
pub mod tavily;
pub mod tokens;

use crate::error::SearchError;
use crate::models::SearchResponse;
use async_trait::async_trait;

/// Web search plus content fetch. Single shot: callers decide what a failure
/// means, implementations never retry.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}
