//! Token budget helpers.
//!
//! Prompts are trimmed by keeping the first `budget` tokens of the cl100k_base
//! encoding and discarding the rest.

use std::sync::OnceLock;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Rough characters-per-token ratio used when the encoder cannot be loaded.
const FALLBACK_CHARS_PER_TOKEN: usize = 4;

static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn encoder() -> Option<&'static CoreBPE> {
    ENCODER
        .get_or_init(|| match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!("Failed to load cl100k_base encoder, falling back to character budget: {}", e);
                None
            }
        })
        .as_ref()
}

pub fn count_tokens(text: &str) -> usize {
    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count().div_ceil(FALLBACK_CHARS_PER_TOKEN),
    }
}

/// Returns `text` unchanged when it fits in `budget` tokens, otherwise its
/// longest decodable prefix of at most `budget` tokens.
pub fn trim_to_tokens(text: &str, budget: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let Some(bpe) = encoder() else {
        return text
            .chars()
            .take(budget.saturating_mul(FALLBACK_CHARS_PER_TOKEN))
            .collect();
    };

    let tokens = bpe.encode_with_special_tokens(text);
    if tokens.len() <= budget {
        return text.to_string();
    }

    // A cut can land inside a multi-byte character; back off a few tokens.
    let mut end = budget;
    while end > 0 && budget - end < 4 {
        if let Ok(prefix) = bpe.decode(tokens[..end].to_vec()) {
            return prefix;
        }
        end -= 1;
    }
    text.chars()
        .take(budget.saturating_mul(FALLBACK_CHARS_PER_TOKEN))
        .collect()
}
