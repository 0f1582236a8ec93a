use crate::error::GenerationError;
use crate::generation::{GenerateOptions, StructuredGenerator};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize, JsonSchema)]
struct FeedbackQuestions {
    /// Follow up questions to clarify the research direction
    questions: Vec<String>,
}

/// Asks clarifying questions about a query before research starts.
pub struct FeedbackGenerator {
    generator: Arc<StructuredGenerator>,
}

impl FeedbackGenerator {
    pub fn new(generator: Arc<StructuredGenerator>) -> Self {
        Self { generator }
    }

    pub async fn generate(
        &self,
        query: &str,
        num_questions: usize,
    ) -> Result<Vec<String>, GenerationError> {
        let prompt = format!(
            "Given the following query from the user, ask some follow up questions to clarify the research direction. Return a maximum of {num_questions} questions, but feel free to return less if the original query is clear: <query>{query}</query>"
        );
        let res = self
            .generator
            .generate::<FeedbackQuestions>(
                &prompt,
                "Generate feedback questions",
                GenerateOptions::default(),
            )
            .await?;

        let mut questions = res.object.questions;
        questions.truncate(num_questions);
        info!("Generated {} clarifying questions", questions.len());
        Ok(questions)
    }
}
