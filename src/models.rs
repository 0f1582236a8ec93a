use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A planned search query. Produced by the planner and consumed once by the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResearchQuery {
    /// The SERP query
    #[serde(rename = "query")]
    pub text: String,
    /// The goal of the research this query is meant to accomplish, then how to advance the
    /// research once results are found, with specific additional research directions
    pub research_goal: String,
    /// Key claims or data points that need verification from authoritative sources
    pub verification_focus: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Verified,
    Likely,
    NeedsVerification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Company,
    News,
    Financial,
    Regulatory,
    Industry,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Company => "company",
            SourceType::News => "news",
            SourceType::Financial => "financial",
            SourceType::Regulatory => "regulatory",
            SourceType::Industry => "industry",
            SourceType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Learning {
    /// The verified fact or learning
    pub fact: String,
    /// Number of independent sources that confirm this fact
    #[serde(rename = "sourcesCount")]
    pub source_count: u32,
    /// Types of sources that confirm this fact
    pub source_types: Vec<SourceType>,
    /// Confidence in the fact based on source quality and consensus
    pub confidence_level: ConfidenceLevel,
    /// Most recent date this information was confirmed
    pub date_verified: String,
    /// Any significant disagreements or alternative viewpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_info: Option<String>,
    /// Any important context or limitations about this fact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limitations: Option<String>,
}

impl Learning {
    pub fn is_verified_enough(&self) -> bool {
        self.confidence_level != ConfidenceLevel::NeedsVerification
    }

    /// Flattens the learning into the provenance-annotated string kept in the
    /// accumulator.
    pub fn annotated(&self) -> String {
        let mut types: Vec<&str> = Vec::with_capacity(self.source_types.len());
        for source_type in &self.source_types {
            if !types.contains(&source_type.as_str()) {
                types.push(source_type.as_str());
            }
        }

        let mut text = format!(
            "{} [Verified by {} {} source(s) as of {}]",
            self.fact,
            self.source_count,
            types.join("/"),
            self.date_verified
        );
        if let Some(conflict) = non_blank(&self.conflicting_info) {
            text.push_str(&format!("\nNote: Alternative viewpoint: {conflict}"));
        }
        if let Some(limits) = non_blank(&self.limitations) {
            text.push_str(&format!("\nContext: {limits}"));
        }
        text
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// One fetched search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub documents: Vec<Document>,
}

/// Immutable progress snapshot emitted by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchProgress {
    pub current_depth: usize,
    pub total_depth: usize,
    pub current_breadth: usize,
    pub total_breadth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_query: Option<String>,
    pub total_queries: usize,
    pub completed_queries: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStats {
    pub contributed: usize,
    pub empty: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
    #[serde(default)]
    pub branches: BranchStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default = "default_breadth")]
    pub breadth: usize,
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_breadth() -> usize {
    4
}

fn default_depth() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResponse {
    pub session_id: String,
    pub query: String,
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
    pub branches: BranchStats,
    pub report: String,
    pub task_times: HashMap<String, u64>,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub query: String,
    #[serde(default = "default_feedback_questions")]
    pub num_questions: usize,
}

fn default_feedback_questions() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub questions: Vec<String>,
}

/// Workflow state carried between graph-flow tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchContext {
    pub session_id: String,
    pub query: String,
    pub breadth: usize,
    pub depth: usize,
    pub result: Option<ResearchResult>,
    pub report: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub query: String,
    pub breadth: usize,
    pub depth: usize,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ResearchProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}
