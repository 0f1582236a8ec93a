use crate::error::BackendError;
use async_trait::async_trait;
use rig::completion::{CompletionError, Prompt, PromptError};
use rig::prelude::*;
use rig::providers::openai;
use serde_json::json;

/// Output mode requested from the provider. Structured generation only ever
/// asks for a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// `None` when the provider answered without any message content.
    pub content: Option<String>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }
}

/// A text-generation backend. Implementations classify every failure into a
/// [`BackendError`] variant before returning it.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, BackendError>;
}

/// OpenAI chat completions through a rig agent.
pub struct RigBackend {
    client: openai::Client,
    model: String,
    temperature: f64,
}

impl RigBackend {
    pub fn new(api_key: &str, model: impl Into<String>, base_url: Option<&str>) -> Self {
        let client = match base_url {
            Some(url) => openai::Client::from_url(api_key, url),
            None => openai::Client::new(api_key),
        };
        Self {
            client,
            model: model.into(),
            temperature: 0.7,
        }
    }
}

#[async_trait]
impl CompletionBackend for RigBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        let builder = self
            .client
            .agent(&self.model)
            .preamble(&request.system_prompt)
            .temperature(self.temperature);
        let agent = match request.response_format {
            ResponseFormat::JsonObject => builder.additional_params(json!({
                "response_format": { "type": "json_object" }
            })),
        }
        .build();

        match agent.prompt(request.user_prompt.clone()).await {
            Ok(content) => Ok(CompletionResponse {
                content: Some(content).filter(|c| !c.trim().is_empty()),
            }),
            // rig reports a reply without message content as a response error.
            Err(PromptError::CompletionError(CompletionError::ResponseError(message)))
                if is_empty_reply(&message) =>
            {
                Ok(CompletionResponse::default())
            }
            Err(err) => Err(classify_prompt_error(err)),
        }
    }
}

fn classify_prompt_error(err: PromptError) -> BackendError {
    match err {
        PromptError::CompletionError(CompletionError::ProviderError(message)) => {
            classify_provider_message(&message)
        }
        other => classify_provider_message(&other.to_string()),
    }
}

fn is_empty_reply(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("no message or tool call") || lower.contains("contained no choices")
}

/// Maps a provider error body or transport message onto a [`BackendError`].
pub fn classify_provider_message(message: &str) -> BackendError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient_quota")
        || lower.contains("invalid_api_key")
        || lower.contains("context_length_exceeded")
    {
        BackendError::Fatal(message.to_string())
    } else if lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || has_status_code(&lower, "429")
    {
        BackendError::RateLimited(message.to_string())
    } else if has_status_code(&lower, "401")
        || has_status_code(&lower, "403")
        || lower.contains("unauthorized")
        || lower.contains("model_not_found")
    {
        BackendError::Fatal(message.to_string())
    } else {
        BackendError::Transient(message.to_string())
    }
}

/// True when `code` appears as a standalone number, so "429" matches
/// "HTTP 429" but not "4290 tokens".
fn has_status_code(message: &str, code: &str) -> bool {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_messages_are_rate_limits() {
        for msg in [
            "Rate limit reached for gpt-4o-mini",
            "HTTP 429",
            "error code: rate_limit_exceeded",
            "Too Many Requests",
        ] {
            assert!(classify_provider_message(msg).is_rate_limit(), "{msg}");
        }
    }

    #[test]
    fn quota_and_auth_failures_are_fatal() {
        assert!(matches!(
            classify_provider_message("You exceeded your current quota: insufficient_quota"),
            BackendError::Fatal(_)
        ));
        assert!(matches!(
            classify_provider_message("401 Unauthorized"),
            BackendError::Fatal(_)
        ));
    }

    #[test]
    fn status_digits_inside_numbers_are_not_status_codes() {
        assert!(matches!(
            classify_provider_message("upstream closed after 4290 bytes"),
            BackendError::Transient(_)
        ));
        assert!(matches!(
            classify_provider_message(
                "This model's maximum context length is 4290 tokens (context_length_exceeded)"
            ),
            BackendError::Fatal(_)
        ));
        assert!(classify_provider_message("status: 429").is_rate_limit());
        assert!(classify_provider_message("(429) slow down").is_rate_limit());
    }

    #[test]
    fn rig_empty_reply_messages_are_recognised() {
        assert!(is_empty_reply("Response contained no message or tool call (empty)"));
        assert!(is_empty_reply("Response contained no choices"));
        assert!(!is_empty_reply("invalid JSON in response body"));
    }

    #[test]
    fn everything_else_is_transient() {
        assert!(matches!(
            classify_provider_message("connection reset by peer"),
            BackendError::Transient(_)
        ));
    }
}
