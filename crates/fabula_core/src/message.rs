//! Timeline messages: narrative beats, markers, branch points and Q&A turns.

use crate::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Branch message id -> chosen option id.
///
/// Ordered so that anything derived from the choices iterates deterministically.
pub type BranchChoices = BTreeMap<String, String>;

/// Special message types. Ordinary narrative beats carry no type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    /// Legacy chapter marker, never narrative content
    #[display("chapter")]
    Chapter,
    /// Script event
    #[display("event")]
    Event,
    /// Branch point offering a choice of continuations
    #[display("branch")]
    Branch,
}

/// One option of a branch message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOption {
    /// Option id, the value stored in [`BranchChoices`]
    pub id: String,
    /// Display text ("Trust the stranger")
    pub label: String,
    /// Chapter node the option leads to
    pub target_node_id: String,
    /// Message in that node where the story resumes
    pub target_message_id: String,
    /// Optional longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A timeline message.
///
/// Messages are owned by the persistence layer; the engine only reads them.
///
/// # Examples
///
/// ```
/// use fabula_core::{Message, MessageBuilder};
///
/// let msg = MessageBuilder::default()
///     .id("m1")
///     .order(1)
///     .content("Rain hammered the tin roof.")
///     .paragraph_summary("A storm rages.")
///     .node_id("chapter-1")
///     .build()
///     .unwrap();
///
/// assert!(msg.is_narrative());
/// assert_eq!(msg.sentence_summary(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(default, setter(into))]
pub struct Message {
    /// Stable unique id
    pub id: String,
    /// Sort key within the owning node
    #[serde(default)]
    pub order: i64,
    /// Narrative messages are always assistant turns
    #[serde(default)]
    pub role: Role,
    /// Full text
    #[serde(default)]
    pub content: String,
    /// The author direction that produced this message (the question, for Q&A turns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub instruction: Option<String>,
    /// Q&A turn, excluded from narrative context
    #[serde(default)]
    pub is_query: bool,
    /// One-sentence summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub sentence_summary: Option<String>,
    /// Older name of the one-sentence summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub summary: Option<String>,
    /// One-paragraph summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub paragraph_summary: Option<String>,
    /// Owning node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub node_id: Option<String>,
    /// Owning legacy chapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub chapter_id: Option<String>,
    /// Message type; `None` for ordinary narrative
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub kind: Option<MessageKind>,
    /// Options, only meaningful on branch messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<BranchOption>,
    /// Compacted stand-in for several messages; always rendered in full
    #[serde(default)]
    pub is_compacted: bool,
}

impl Message {
    /// Plain narrative beat, handy for fixtures and importers.
    pub fn narrative(id: impl Into<String>, order: i64, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order,
            content: content.into(),
            ..Self::default()
        }
    }

    /// Whether this message can appear in the narrative spine:
    /// an assistant turn that is neither a Q&A turn nor a chapter marker.
    pub fn is_narrative(&self) -> bool {
        !self.is_query && self.role == Role::Assistant && self.kind != Some(MessageKind::Chapter)
    }

    /// A branch message with at least one option.
    pub fn is_branch_point(&self) -> bool {
        self.kind == Some(MessageKind::Branch) && !self.options.is_empty()
    }

    /// The one-sentence summary, falling back to the older `summary` field.
    pub fn sentence_summary(&self) -> Option<&str> {
        self.sentence_summary
            .as_deref()
            .or(self.summary.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// The paragraph summary, if one was written.
    pub fn paragraph_summary(&self) -> Option<&str> {
        self.paragraph_summary.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether the content has any non-whitespace text.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// The option with the given id.
    pub fn option(&self, option_id: &str) -> Option<&BranchOption> {
        self.options.iter().find(|opt| opt.id == option_id)
    }
}
