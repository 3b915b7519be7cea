//! Role-tagged content blocks handed to generation backends.

use crate::Role;
use serde::{Deserialize, Serialize};

/// Lifetime of a provider-side prompt cache entry.
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
    derive_more::Display,
    strum::EnumString,
)]
pub enum CacheTtl {
    /// Five minutes
    #[serde(rename = "5m")]
    #[strum(serialize = "5m")]
    #[display("5m")]
    FiveMinutes,
    /// One hour
    #[default]
    #[serde(rename = "1h")]
    #[strum(serialize = "1h")]
    #[display("1h")]
    OneHour,
}

/// Kind of cache hint. Providers currently only define ephemeral caching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Short-lived, provider-managed cache entry
    #[default]
    Ephemeral,
}

/// Cache-partition hint attached to a block.
///
/// Serializes as `{"type": "ephemeral", "ttl": "1h"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheControl {
    /// Cache kind
    #[serde(rename = "type")]
    pub kind: CacheKind,
    /// How long the provider keeps the cached prefix
    pub ttl: CacheTtl,
}

impl CacheControl {
    /// An ephemeral hint with the given lifetime.
    pub fn ephemeral(ttl: CacheTtl) -> Self {
        Self {
            kind: CacheKind::Ephemeral,
            ttl,
        }
    }
}

/// One block of an assembled context.
///
/// # Examples
///
/// ```
/// use fabula_core::{CacheTtl, ChatMessage, Role};
///
/// let block = ChatMessage::assistant("The gate creaked open.").cached(CacheTtl::OneHour);
/// assert_eq!(block.role, Role::Assistant);
///
/// let json = serde_json::to_value(&block).unwrap();
/// assert_eq!(json["cache_control"]["type"], "ephemeral");
/// assert_eq!(json["cache_control"]["ttl"], "1h");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking
    pub role: Role,
    /// Block text
    pub content: String,
    /// Optional provider cache hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl ChatMessage {
    /// A block with the given role and no cache hint.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            cache_control: None,
        }
    }

    /// A system block.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// A user block.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant block.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Returns the block with an ephemeral cache hint attached.
    pub fn cached(mut self, ttl: CacheTtl) -> Self {
        self.cache_control = Some(CacheControl::ephemeral(ttl));
        self
    }

    /// Whether a cache hint is attached.
    pub fn is_cached(&self) -> bool {
        self.cache_control.is_some()
    }
}
