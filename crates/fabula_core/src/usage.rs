//! Token usage reported by generation backends.

use serde::{Deserialize, Serialize};

/// Token usage for one generation call, split by cache behaviour.
///
/// # Examples
///
/// ```
/// use fabula_core::TokenUsage;
///
/// let usage = TokenUsage::new(1200, 30_000, 0, 450);
/// assert_eq!(*usage.input_cache_read(), 30_000);
/// assert_eq!(usage.total(), 31_650);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_getters::Getters,
)]
pub struct TokenUsage {
    /// Regular input tokens (not cached)
    #[serde(default)]
    input_normal: u64,
    /// Input tokens served from the provider cache
    #[serde(default)]
    input_cache_read: u64,
    /// Input tokens written to the provider cache
    #[serde(default)]
    input_cache_write: u64,
    /// Output tokens
    #[serde(default)]
    output_normal: u64,
}

impl TokenUsage {
    /// Create a new token usage record.
    pub fn new(
        input_normal: u64,
        input_cache_read: u64,
        input_cache_write: u64,
        output_normal: u64,
    ) -> Self {
        Self {
            input_normal,
            input_cache_read,
            input_cache_write,
            output_normal,
        }
    }

    /// All input tokens, cached or not.
    pub fn input_total(&self) -> u64 {
        self.input_normal + self.input_cache_read + self.input_cache_write
    }

    /// Input plus output tokens.
    pub fn total(&self) -> u64 {
        self.input_total() + self.output_normal
    }

    /// Sums two usage records, e.g. across streamed usage deltas.
    pub fn merge(&self, other: &TokenUsage) -> TokenUsage {
        TokenUsage {
            input_normal: self.input_normal + other.input_normal,
            input_cache_read: self.input_cache_read + other.input_cache_read,
            input_cache_write: self.input_cache_write + other.input_cache_write,
            output_normal: self.output_normal + other.output_normal,
        }
    }
}
