//! Story files read by the `fabula` binary.

use fabula_core::{BranchChoices, Chapter, Message, Node};
use fabula_error::{FabulaResult, JsonError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// A story exported from the persistence layer as JSON.
///
/// ```json
/// {
///   "messages": [{ "id": "m1", "order": 1, "content": "...", "nodeId": "ch1" }],
///   "nodes": [{ "id": "ch1", "type": "chapter", "title": "Arrival", "order": 1 }],
///   "chapters": [],
///   "branchChoices": { "b1": "left" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryFile {
    /// Timeline in storage order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Node tree
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Legacy chapter records
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Branch message id -> chosen option id
    #[serde(default)]
    pub branch_choices: BranchChoices,
}

impl StoryFile {
    /// Parses a story from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a JSON error when the text is not a valid story.
    pub fn from_json(json: &str) -> FabulaResult<Self> {
        let story: Self = serde_json::from_str(json).map_err(JsonError::from)?;
        Ok(story)
    }

    /// Reads and parses a story file.
    ///
    /// # Errors
    ///
    /// Returns a JSON error when the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> FabulaResult<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            JsonError::new(format!(
                "Failed to read story file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let story = Self::from_json(&json)?;
        debug!(
            messages = story.messages.len(),
            nodes = story.nodes.len(),
            chapters = story.chapters.len(),
            "Loaded story"
        );
        Ok(story)
    }
}
