//! Schema-validated generation on top of an unreliable text backend.
//!
//! Accepted response shapes are the schema object itself or the same object
//! wrapped as `{"data": <object>}`. Anything else is a validation failure.

mod retry;

pub use retry::RetryPolicy;

use crate::error::{BackendError, GenerationError, ValidationError};
use crate::prompts::{self, ENVELOPE_KEY};
use crate::tools::llm::{CompletionBackend, CompletionRequest, CompletionResponse, ResponseFormat};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Receives human readable status lines during a generation call.
pub type StatusSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct GenerateOptions {
    /// Per backend call limit. An expired call counts as one failed attempt.
    pub timeout: Option<Duration>,
    pub on_status: Option<StatusSink>,
}

impl GenerateOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            on_status: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedObject<T> {
    pub object: T,
    pub raw: String,
}

pub struct StructuredGenerator {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
}

impl StructuredGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn generate<T>(
        &self,
        prompt: &str,
        operation: &str,
        options: GenerateOptions,
    ) -> Result<ValidatedObject<T>, GenerationError>
    where
        T: DeserializeOwned + JsonSchema + Send,
    {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(T))
            .map_err(GenerationError::Schema)?;
        let system_prompt = format!(
            "{}\n\n{}",
            prompts::system_prompt(),
            prompts::json_instruction()
        );
        let base_prompt = format!("{prompt}{}", prompts::schema_suffix(&schema));
        let budget = self.policy.validation_retries;

        let mut user_prompt = base_prompt.clone();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            emit(&options, operation, "generating response");
            let request = CompletionRequest {
                system_prompt: system_prompt.clone(),
                user_prompt: user_prompt.clone(),
                response_format: ResponseFormat::JsonObject,
            };

            match self.complete_with_backoff(&request, operation, &options).await {
                Ok(CompletionResponse { content: None }) => {
                    return Err(GenerationError::NoContent {
                        operation: operation.to_string(),
                    });
                }
                Ok(CompletionResponse { content: Some(raw) }) => {
                    emit(&options, operation, "processing response");
                    match parse_validated::<T>(&raw) {
                        Ok(object) => {
                            emit(&options, operation, "validation successful");
                            debug!(operation, attempt, "Structured response accepted");
                            return Ok(ValidatedObject { object, raw });
                        }
                        Err(source) if attempt > budget => {
                            return Err(GenerationError::Validation {
                                operation: operation.to_string(),
                                attempts: attempt,
                                source,
                            });
                        }
                        Err(err) => {
                            warn!(operation, attempt, error = %err, "Schema validation failed, retrying");
                            emit(&options, operation, "retrying due to validation error");
                            user_prompt = format!(
                                "{base_prompt}{}",
                                prompts::strict_json_suffix(attempt, &err.to_string())
                            );
                        }
                    }
                }
                Err(source @ BackendError::RateLimited(_)) => {
                    return Err(GenerationError::RateLimited {
                        operation: operation.to_string(),
                        retries: self.policy.max_retries,
                        source,
                    });
                }
                Err(source @ BackendError::Fatal(_)) => {
                    return Err(GenerationError::Backend {
                        operation: operation.to_string(),
                        source,
                    });
                }
                Err(source) if attempt > budget => {
                    return Err(GenerationError::Backend {
                        operation: operation.to_string(),
                        source,
                    });
                }
                Err(err) => {
                    warn!(operation, attempt, error = %err, "Backend call failed, retrying");
                    emit(
                        &options,
                        operation,
                        &format!("attempt {attempt} failed, retrying"),
                    );
                }
            }

            tokio::time::sleep(self.policy.validation_delay(attempt)).await;
        }
    }

    /// One logical backend call: rate limits are absorbed here with backoff,
    /// every other outcome is handed back to the caller.
    async fn complete_with_backoff(
        &self,
        request: &CompletionRequest,
        operation: &str,
        options: &GenerateOptions,
    ) -> Result<CompletionResponse, BackendError> {
        let mut retries: u32 = 0;
        loop {
            let call = self.backend.complete(request);
            let result = match options.timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::Timeout(limit)),
                },
                None => call.await,
            };

            match result {
                Err(BackendError::RateLimited(message)) if retries < self.policy.max_retries => {
                    let delay = self.policy.backoff_delay(retries);
                    retries += 1;
                    warn!(
                        operation,
                        retry = retries,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited: {}",
                        message
                    );
                    emit(
                        options,
                        operation,
                        &format!(
                            "rate limited, retrying in {} ms (attempt {}/{})",
                            delay.as_millis(),
                            retries,
                            self.policy.max_retries
                        ),
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

fn emit(options: &GenerateOptions, operation: &str, status: &str) {
    if let Some(sink) = &options.on_status {
        sink(&format!("{operation}: {status}"));
    }
}

/// Parses `raw` as JSON and deserializes it into `T`, first as the bare
/// object, then from under the envelope key.
pub fn parse_validated<T: DeserializeOwned>(raw: &str) -> Result<T, ValidationError> {
    let value: Value = serde_json::from_str(raw).map_err(ValidationError::InvalidJson)?;

    let direct = match T::deserialize(&value) {
        Ok(object) => return Ok(object),
        Err(err) => err.to_string(),
    };

    match value.get(ENVELOPE_KEY) {
        Some(inner) => T::deserialize(inner).map_err(|err| ValidationError::Schema {
            direct,
            enveloped: Some(err.to_string()),
        }),
        None => Err(ValidationError::Schema {
            direct,
            enveloped: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Questions {
        questions: Vec<String>,
    }

    #[test]
    fn accepts_bare_object() {
        let parsed: Questions = parse_validated(r#"{"questions": ["a", "b"]}"#).unwrap();
        assert_eq!(parsed.questions, vec!["a", "b"]);
    }

    #[test]
    fn accepts_enveloped_object() {
        let parsed: Questions = parse_validated(r#"{"data": {"questions": ["a"]}}"#).unwrap();
        assert_eq!(parsed.questions, vec!["a"]);
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = parse_validated::<Questions>("not json").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidJson(_)));
    }

    #[test]
    fn wrong_shape_reports_both_attempts() {
        let err = parse_validated::<Questions>(r#"{"data": {"questions": [1, 2]}}"#).unwrap_err();
        match err {
            ValidationError::Schema { enveloped, .. } => assert!(enveloped.is_some()),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = parse_validated::<Questions>(r#"{"queries": []}"#).unwrap_err();
        assert!(matches!(err, ValidationError::Schema { enveloped: None, .. }));
    }
}
