//! Recursive web research: plan search queries, fetch results, extract
//! learnings, follow up on open questions, and write a report.

pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod prompts;
pub mod research;
pub mod server;
pub mod sessions;
pub mod tasks;
pub mod tools;

pub use error::{BackendError, GenerationError, ResearchError, SearchError, ValidationError};
pub use generation::{GenerateOptions, RetryPolicy, StructuredGenerator, ValidatedObject};
pub use research::{
    ContentExtractor, FeedbackGenerator, QueryPlanner, ReportSynthesizer, ResearchOrchestrator,
};
