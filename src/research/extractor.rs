use crate::config::{DOCUMENT_TOKEN_BUDGET, EXTRACTION_TIMEOUT};
use crate::error::GenerationError;
use crate::generation::{GenerateOptions, StructuredGenerator};
use crate::models::{Document, Learning};
use crate::tools::tokens::trim_to_tokens;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct SerpExtraction {
    /// List of verified learnings
    learnings: Vec<Learning>,
    /// List of follow-up questions to research the topic further
    follow_up_questions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Learnings that survived the confidence filter.
    pub learnings: Vec<Learning>,
    pub follow_up_questions: Vec<String>,
}

impl Extraction {
    pub fn annotated_learnings(&self) -> Vec<String> {
        self.learnings.iter().map(Learning::annotated).collect()
    }
}

pub struct ContentExtractor {
    generator: Arc<StructuredGenerator>,
}

impl ContentExtractor {
    pub fn new(generator: Arc<StructuredGenerator>) -> Self {
        Self { generator }
    }

    pub async fn extract(
        &self,
        query: &str,
        documents: &[Document],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> Result<Extraction, GenerationError> {
        let contents: Vec<String> = documents
            .iter()
            .filter(|d| !d.content.trim().is_empty())
            .map(|d| trim_to_tokens(&d.content, DOCUMENT_TOKEN_BUDGET))
            .collect();
        info!("Ran {}, found {} contents", query, contents.len());

        if contents.is_empty() {
            return Ok(Extraction::default());
        }

        let prompt = extraction_prompt(query, &contents, max_learnings, max_follow_ups);
        let res = self
            .generator
            .generate::<SerpExtraction>(
                &prompt,
                "Process SERP results",
                GenerateOptions::with_timeout(EXTRACTION_TIMEOUT),
            )
            .await?;

        let returned = res.object.learnings.len();
        let learnings: Vec<Learning> = res
            .object
            .learnings
            .into_iter()
            .filter(Learning::is_verified_enough)
            .take(max_learnings)
            .collect();
        let follow_up_questions: Vec<String> = res
            .object
            .follow_up_questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(max_follow_ups)
            .collect();
        debug!(
            returned,
            kept = learnings.len(),
            follow_ups = follow_up_questions.len(),
            "Extracted learnings for '{}'",
            query
        );

        Ok(Extraction {
            learnings,
            follow_up_questions,
        })
    }
}

fn extraction_prompt(
    query: &str,
    contents: &[String],
    max_learnings: usize,
    max_follow_ups: usize,
) -> String {
    let body = contents
        .iter()
        .map(|content| format!("<content>\n{content}\n</content>"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Given the following contents from a SERP search for the query <query>{query}</query>, generate a list of learnings from the contents.

RESEARCH REQUIREMENTS:
- Focus on verifiable facts and metrics
- Extract key achievements, milestones, projects, contracts and partnerships
- Note size, revenue and growth metrics when available
- Verify claims against official sources and press releases
- Consider both first-party statements and independent analysis

For each learning:
1. Verify information across multiple sources
2. Prioritize recent developments
3. Include specific numbers, dates, and measurable outcomes
4. Mark confidenceLevel as needs_verification when only one weak source supports it

Return a maximum of {max_learnings} learnings, but feel free to return less if the contents are clear. Make sure each learning is unique and not similar to each other. The learnings should be concise and to the point, as detailed and information dense as possible. Also return a maximum of {max_follow_ups} follow-up questions to research the topic further.

<contents>{body}</contents>"#
    )
}
