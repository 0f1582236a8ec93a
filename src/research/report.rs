use crate::config::REPORT_TOKEN_BUDGET;
use crate::error::GenerationError;
use crate::generation::{GenerateOptions, StructuredGenerator};
use crate::tools::tokens::trim_to_tokens;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct FinalReport {
    /// Final report on the topic in Markdown
    report_markdown: String,
}

/// Writes the final markdown report from the accumulated learnings.
pub struct ReportSynthesizer {
    generator: Arc<StructuredGenerator>,
}

impl ReportSynthesizer {
    pub fn new(generator: Arc<StructuredGenerator>) -> Self {
        Self { generator }
    }

    pub async fn write(
        &self,
        original_prompt: &str,
        learnings: &[String],
        visited_urls: &[String],
    ) -> Result<String, GenerationError> {
        let learnings_block = trim_to_tokens(
            &learnings
                .iter()
                .map(|learning| format!("<learning>\n{learning}\n</learning>"))
                .collect::<Vec<_>>()
                .join("\n"),
            REPORT_TOKEN_BUDGET,
        );

        let prompt = format!(
            "Given the following prompt from the user, write a final report on the topic using the learnings from research. Make it as detailed as possible, aim for 3 or more pages, include ALL the learnings from research:\n\n<prompt>{original_prompt}</prompt>\n\nHere are all the learnings from previous research:\n\n<learnings>\n{learnings_block}\n</learnings>"
        );

        let res = self
            .generator
            .generate::<FinalReport>(&prompt, "Generate final report", GenerateOptions::default())
            .await?;

        info!(
            "Generated report with {} characters from {} learnings",
            res.object.report_markdown.len(),
            learnings.len()
        );
        Ok(append_sources(&res.object.report_markdown, visited_urls))
    }
}

/// Appends the sources section. Every visited URL is listed in input order,
/// whatever the backend wrote.
pub fn append_sources(report: &str, visited_urls: &[String]) -> String {
    let sources = visited_urls
        .iter()
        .map(|url| format!("- {url}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{report}\n\n## Sources\n\n{sources}")
}
