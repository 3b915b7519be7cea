//! A single view over chapter nodes and legacy chapter records.

use crate::{Chapter, Inclusion, Message, Node};
use serde::{Deserialize, Serialize};

/// Where a [`Container`] came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ContainerSource {
    /// A chapter node of the node tree
    #[display("node")]
    Node,
    /// A legacy chapter record
    #[display("legacy_chapter")]
    LegacyChapter,
}

/// A grouping of messages that is summarized, skipped or included as a unit.
///
/// The assembler walks containers without caring which system they came
/// from; adapters at the boundary translate nodes and legacy chapters.
///
/// # Examples
///
/// ```
/// use fabula_core::{Chapter, Container, ContainerSource, Inclusion};
///
/// let chapter = Chapter {
///     id: "c1".to_string(),
///     title: "Prologue".to_string(),
///     summary: None,
///     order: 0,
///     include_in_full: Inclusion::Full,
/// };
/// let container = Container::from(&chapter);
/// assert_eq!(container.source, ContainerSource::LegacyChapter);
/// assert_eq!(container.inclusion, Inclusion::Full);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Id of the node or chapter
    pub id: String,
    /// Display title
    pub title: String,
    /// Sort key among siblings
    pub order: i64,
    /// Parent node, for node containers
    pub parent_id: Option<String>,
    /// Summary, required before the container can stand in as a summary
    pub summary: Option<String>,
    /// Representation when the container precedes the generation point
    pub inclusion: Inclusion,
    /// Objective surfaced to generation when this is the current container
    pub goal: Option<String>,
    /// Provenance
    pub source: ContainerSource,
}

impl Container {
    /// The id a message uses to point at a container of this provenance.
    pub fn owner_id<'m>(source: ContainerSource, message: &'m Message) -> Option<&'m str> {
        match source {
            ContainerSource::Node => message.node_id.as_deref(),
            ContainerSource::LegacyChapter => message.chapter_id.as_deref(),
        }
    }

    /// The summary, if one was written.
    pub fn written_summary(&self) -> Option<&str> {
        self.summary.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl From<&Node> for Container {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            title: node.title.clone(),
            order: node.order,
            parent_id: node.parent_id.clone(),
            summary: node.summary.clone(),
            inclusion: node.include_in_full,
            goal: node.goal.clone().filter(|g| !g.trim().is_empty()),
            source: ContainerSource::Node,
        }
    }
}

impl From<&Chapter> for Container {
    fn from(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id.clone(),
            title: chapter.title.clone(),
            order: chapter.order,
            parent_id: None,
            summary: chapter.summary.clone(),
            inclusion: chapter.include_in_full,
            goal: None,
            source: ContainerSource::LegacyChapter,
        }
    }
}
