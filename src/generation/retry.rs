use rand::Rng;
use std::time::Duration;

/// Retry knobs of the structured generator.
///
/// Rate-limited backend calls back off exponentially (`initial_wait * 2^n`,
/// capped at `max_wait`) plus up to `jitter_max` of random jitter, at most
/// `max_retries` times. Responses that fail validation, and transient backend
/// failures, are retried separately up to `validation_retries` times with a
/// linear `validation_pause * attempt` pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_wait: Duration,
    pub max_wait: Duration,
    pub jitter_max: Duration,
    pub validation_retries: u32,
    pub validation_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(32),
            jitter_max: Duration::from_secs(1),
            validation_retries: 2,
            validation_pause: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff before rate-limit retry number `retry` (zero based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        self.initial_wait
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_wait)
    }

    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay(retry) + self.jitter()
    }

    /// Pause before local retry `attempt` (one based).
    pub fn validation_delay(&self, attempt: u32) -> Duration {
        self.validation_pause.saturating_mul(attempt)
    }

    fn jitter(&self) -> Duration {
        let max = self.jitter_max.as_micros() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..max))
    }
}
