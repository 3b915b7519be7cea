//! The node tree (book, arc, chapter, scene) and legacy chapter records.

use serde::{Deserialize, Serialize};

/// Kind of a node in the story hierarchy.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    /// Top level
    #[display("book")]
    Book,
    /// Group of chapters
    #[display("arc")]
    Arc,
    /// Unit of summarization; owns messages
    #[default]
    #[display("chapter")]
    Chapter,
    /// Point-of-view section inside a chapter
    #[display("scene")]
    Scene,
}

/// How a previous container is represented in context.
///
/// Stored as the integers `0`, `1`, `2`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Inclusion {
    /// Left out entirely
    #[display("omit")]
    Omit,
    /// Represented by its summary
    #[default]
    #[display("summary")]
    Summary,
    /// Every message included verbatim
    #[display("full")]
    Full,
}

impl TryFrom<u8> for Inclusion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Omit),
            1 => Ok(Self::Summary),
            2 => Ok(Self::Full),
            other => Err(format!("includeInFull must be 0, 1 or 2, got {}", other)),
        }
    }
}

impl From<Inclusion> for u8 {
    fn from(value: Inclusion) -> Self {
        match value {
            Inclusion::Omit => 0,
            Inclusion::Summary => 1,
            Inclusion::Full => 2,
        }
    }
}

/// A node of the story tree.
///
/// Story order is a depth-first walk with siblings sorted by `order`.
///
/// # Examples
///
/// ```
/// use fabula_core::{Inclusion, NodeBuilder, NodeKind};
///
/// let node = NodeBuilder::default()
///     .id("ch1")
///     .parent_id("arc1")
///     .title("The Crossing")
///     .order(1)
///     .summary("They cross the river.")
///     .build()
///     .unwrap();
///
/// assert_eq!(node.kind, NodeKind::Chapter);
/// assert_eq!(node.include_in_full, Inclusion::Summary);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(default, setter(into))]
pub struct Node {
    /// Unique id
    pub id: String,
    /// Parent node; `None` at the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub parent_id: Option<String>,
    /// Node kind
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Sibling sort key
    #[serde(default)]
    pub order: i64,
    /// Summary used when the node is represented by summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub summary: Option<String>,
    /// Representation when this node precedes the generation point
    #[serde(default)]
    pub include_in_full: Inclusion,
    /// Chapter objective surfaced to generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub goal: Option<String>,
    /// Point-of-view character
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub viewpoint_character_id: Option<String>,
}

impl Node {
    /// Whether this node is a chapter.
    pub fn is_chapter(&self) -> bool {
        self.kind == NodeKind::Chapter
    }
}

/// Legacy chapter record, from before the node tree existed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Unique id
    pub id: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Chapter summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Sort key
    #[serde(default)]
    pub order: i64,
    /// Representation when this chapter precedes the generation point
    #[serde(default)]
    pub include_in_full: Inclusion,
}
