//! Core type definitions for the Fabula interface.

use fabula_core::{ChatMessage, Character, Container, ContextItem, Message, TokenUsage};
use serde::{Deserialize, Serialize};

/// What the assembled context is for.
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
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ContextType {
    /// Continue the story
    #[default]
    #[display("story")]
    Story,
    /// Answer a question about the story
    #[display("query")]
    Query,
    /// Continue the story from an analyzer-selected subset of messages
    #[display("smart-story")]
    SmartStory,
}

/// A generation call.
///
/// # Examples
///
/// ```
/// use fabula_core::ChatMessage;
/// use fabula_interface::GenerationRequest;
///
/// let request = GenerationRequest::builder()
///     .model("claude-sonnet-4-5")
///     .messages(vec![ChatMessage::user("Begin.")])
///     .build()
///     .unwrap();
///
/// assert!(request.stream);
/// assert_eq!(request.max_tokens, None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct GenerationRequest {
    /// Model identifier
    pub model: String,
    /// Assembled context, in order
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response
    #[builder(default = "true")]
    pub stream: bool,
    /// Maximum number of tokens to generate
    #[builder(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Creates a new request builder.
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder::default()
    }
}

/// One item of a generation stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationChunk {
    /// Incremental text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Usage counters, usually on the last chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

impl GenerationChunk {
    /// A text delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// The closing chunk with final usage.
    pub fn finished(usage: Option<TokenUsage>) -> Self {
        Self {
            text: None,
            usage,
            done: true,
        }
    }
}

/// Inputs handed to a [`SceneRelevanceAnalyzer`](crate::SceneRelevanceAnalyzer).
#[derive(Debug, Clone, Copy)]
pub struct SmartContextRequest<'a> {
    /// The author's direction for the next turn
    pub input_text: &'a str,
    /// The whole timeline
    pub messages: &'a [Message],
    /// Known characters
    pub characters: &'a [Character],
    /// Known world-building items
    pub context_items: &'a [ContextItem],
    /// Containers in story order
    pub containers: &'a [Container],
    /// Message the generation is anchored to
    pub target_message_id: Option<&'a str>,
    /// Whether missing chapter summaries may be ignored
    pub force_missing_summaries: bool,
}

/// How a container was represented in an assembled context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ContainerMode {
    /// Left out (`includeInFull = 0`, or no summary under force)
    #[display("skipped")]
    Skipped,
    /// Represented by its summary block
    #[display("summary")]
    Summary,
    /// Header plus every message verbatim
    #[display("full")]
    Full,
    /// The container being written, rendered through the tier selector
    #[display("current")]
    Current,
}

/// Structured events emitted while assembling a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActivityEvent {
    /// Assembly began.
    AssemblyStarted {
        /// Requested context type
        context_type: ContextType,
        /// Size of the timeline
        message_count: usize,
        /// Number of containers available
        container_count: usize,
    },
    /// The active path was recomputed from branch choices.
    ActivePathResolved {
        /// Messages on the path
        active_messages: usize,
        /// Nodes on the path
        active_nodes: usize,
    },
    /// A container was rendered (or skipped).
    ContainerEmitted {
        /// Container title
        title: String,
        /// Representation chosen
        mode: ContainerMode,
        /// Blocks contributed
        blocks: usize,
    },
    /// Smart context was requested but could not be used.
    SmartContextUnavailable {
        /// Why the deterministic path was used instead
        reason: String,
    },
    /// Assembly finished; carries the exact request content.
    AssemblyCompleted {
        /// The assembled blocks
        messages: Vec<ChatMessage>,
        /// Sum of block lengths in characters
        total_chars: usize,
    },
}
