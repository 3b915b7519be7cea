//! Branch resolution: the single storyline implied by the choices made so far.
//!
//! The walk goes chapter by chapter in story order. A chapter's messages are
//! those of its whole subtree, so scene messages are walked with their
//! chapter, ordered by node story order and then by `order`. At a branch
//! point the chosen option's target message becomes the new position. The
//! walk ends at the end of the story or at the first branch it cannot follow
//! (no choice, unknown option, unknown target, or a branch already taken).
//! Everything visited up to that point stays on the path.

use crate::tree::{chapters_in_story_order, messages_by_chapter, node_chapters};
use fabula_core::{BranchChoices, BranchOption, Message, Node};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Message and node ids on the active storyline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivePath {
    /// Messages on the path
    pub active_message_ids: BTreeSet<String>,
    /// Chapter nodes on the path
    pub active_node_ids: BTreeSet<String>,
}

impl ActivePath {
    /// Whether the message is on the path.
    pub fn contains_message(&self, id: &str) -> bool {
        self.active_message_ids.contains(id)
    }

    /// Whether the node is on the path.
    pub fn contains_node(&self, id: &str) -> bool {
        self.active_node_ids.contains(id)
    }
}

/// Why a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkEnd {
    /// Ran off the end of the story
    Finished,
    /// A branch could not be followed
    Stopped,
    /// A message was reached twice
    Revisited,
    /// The step budget ran out
    Exhausted,
}

/// Precomputed story order shared by the walkers.
struct StoryIndex<'a> {
    /// Chapter nodes in story order
    chapters: Vec<&'a Node>,
    /// Chapter id -> index in `chapters`
    position: HashMap<&'a str, usize>,
    /// Node id -> nearest chapter id
    chapter_of: HashMap<&'a str, &'a str>,
    /// Chapter id -> messages of its subtree
    messages: HashMap<&'a str, Vec<&'a Message>>,
}

impl<'a> StoryIndex<'a> {
    fn new(messages: &'a [Message], nodes: &'a [Node]) -> Self {
        let chapters = chapters_in_story_order(nodes);
        let position = chapters
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.as_str(), index))
            .collect();
        Self {
            chapters,
            position,
            chapter_of: node_chapters(nodes),
            messages: messages_by_chapter(messages, nodes),
        }
    }

    fn messages_of(&self, chapter_id: &str) -> &[&'a Message] {
        self.messages.get(chapter_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Index of the chapter containing `node_id`.
    fn chapter_index(&self, node_id: &str) -> Option<usize> {
        let chapter = self.chapter_of.get(node_id)?;
        self.position.get(chapter).copied()
    }

    /// Position to resume at after taking `option`, if it resolves.
    ///
    /// The target node may be a chapter or any node below one; the target
    /// message is looked up in that chapter's messages.
    fn target(&self, option: &BranchOption) -> Option<(usize, usize)> {
        let node_index = self.chapter_index(&option.target_node_id);
        let message_index = node_index.and_then(|index| {
            self.messages_of(&self.chapters[index].id)
                .iter()
                .position(|m| m.id == option.target_message_id)
        });

        match (node_index, message_index) {
            (Some(node_index), Some(message_index)) => Some((node_index, message_index)),
            (None, _) => {
                warn!(target_node_id = %option.target_node_id, "Branch target node not found");
                None
            }
            (_, None) => {
                warn!(target_message_id = %option.target_message_id, "Branch target message not found");
                None
            }
        }
    }

    /// Walks the story under `choices`, calling `on_message` for every visited
    /// message and `on_node` for every entered chapter node.
    fn walk(
        &self,
        choices: &BranchChoices,
        max_steps: Option<usize>,
        mut on_node: impl FnMut(&'a Node),
        mut on_message: impl FnMut(&'a Message) -> bool,
    ) -> WalkEnd {
        let mut node_index = 0;
        let mut message_index = 0;
        let mut steps = 0;
        let mut taken_branches: HashSet<&str> = HashSet::new();

        while node_index < self.chapters.len() {
            steps += 1;
            if max_steps.is_some_and(|max| steps > max) {
                return WalkEnd::Exhausted;
            }

            let node = self.chapters[node_index];
            let node_messages = self.messages_of(&node.id);

            if node_messages.is_empty() {
                node_index += 1;
                message_index = 0;
                continue;
            }

            on_node(node);

            let mut jumped = false;
            while message_index < node_messages.len() {
                let message = node_messages[message_index];

                if !on_message(message) {
                    return WalkEnd::Revisited;
                }

                if message.is_branch_point() {
                    if !taken_branches.insert(message.id.as_str()) {
                        warn!(branch_id = %message.id, "Branch reached twice, stopping path");
                        return WalkEnd::Stopped;
                    }

                    let Some(option_id) = choices.get(&message.id) else {
                        debug!(branch_id = %message.id, "Path stops at unresolved branch");
                        return WalkEnd::Stopped;
                    };

                    let Some(option) = message.option(option_id) else {
                        warn!(branch_id = %message.id, option_id = %option_id, "Chosen option not found");
                        return WalkEnd::Stopped;
                    };

                    let Some((target_node, target_message)) = self.target(option) else {
                        return WalkEnd::Stopped;
                    };

                    node_index = target_node;
                    message_index = target_message;
                    jumped = true;
                    break;
                }

                message_index += 1;
            }

            if !jumped {
                node_index += 1;
                message_index = 0;
            }
        }

        WalkEnd::Finished
    }
}

/// Computes the active path through a branching story.
///
/// Pure and idempotent: the path is recomputed from scratch on every call.
/// An unresolved branch yields a shorter but valid path.
///
/// # Examples
///
/// ```
/// use fabula_context::resolve_active_path;
/// use fabula_core::{BranchChoices, Message, NodeBuilder};
///
/// let nodes = vec![NodeBuilder::default().id("ch1").build().unwrap()];
/// let mut first = Message::narrative("m1", 1, "It began.");
/// first.node_id = Some("ch1".to_string());
///
/// let path = resolve_active_path(&[first], &nodes, &BranchChoices::new());
/// assert!(path.contains_message("m1"));
/// assert!(path.contains_node("ch1"));
/// ```
#[instrument(skip_all, fields(messages = messages.len(), nodes = nodes.len(), choices = choices.len()))]
pub fn resolve_active_path(
    messages: &[Message],
    nodes: &[Node],
    choices: &BranchChoices,
) -> ActivePath {
    let mut path = ActivePath::default();
    if messages.is_empty() || nodes.is_empty() {
        return path;
    }

    let index = StoryIndex::new(messages, nodes);
    let mut node_ids = BTreeSet::new();
    let mut message_ids = BTreeSet::new();

    index.walk(
        choices,
        None,
        |node| {
            node_ids.insert(node.id.clone());
        },
        |message| {
            message_ids.insert(message.id.clone());
            true
        },
    );

    path.active_node_ids = node_ids;
    path.active_message_ids = message_ids;

    debug!(
        active_messages = path.active_message_ids.len(),
        active_nodes = path.active_node_ids.len(),
        "Resolved active path"
    );

    path
}

/// The message that follows `message_id` under `choices`.
///
/// A branch point continues at its chosen option's target; any other message
/// continues with the next message of its chapter (scenes included), then
/// with the first message of the next chapter that has messages. `None` at the end of the
/// story, at an unresolved branch, or when the message is unknown.
pub fn next_message_in_path(
    message_id: &str,
    messages: &[Message],
    nodes: &[Node],
    choices: &BranchChoices,
) -> Option<String> {
    let current = messages.iter().find(|m| m.id == message_id)?;
    let node_id = current.node_id.as_deref()?;

    if current.is_branch_point() {
        let option_id = choices.get(&current.id)?;
        return current
            .option(option_id)
            .map(|option| option.target_message_id.clone());
    }

    let index = StoryIndex::new(messages, nodes);
    let chapter_index = index.chapter_index(node_id)?;
    let siblings = index.messages_of(&index.chapters[chapter_index].id);
    let next_sibling = siblings
        .iter()
        .position(|m| m.id == message_id)
        .and_then(|position| siblings.get(position + 1));
    if let Some(next) = next_sibling {
        return Some(next.id.clone());
    }

    index.chapters[chapter_index + 1..]
        .iter()
        .find_map(|node| index.messages_of(&node.id).first())
        .map(|message| message.id.clone())
}

/// Whether `choices`, with `new_choice` applied, make the story loop.
///
/// A walk that reaches a message twice, or that takes more than twice as
/// many steps as there are messages, is a loop. A walk that ends at an
/// unresolved or broken branch is not.
pub fn detect_path_loop(
    messages: &[Message],
    nodes: &[Node],
    choices: &BranchChoices,
    new_choice: Option<(&str, &str)>,
) -> bool {
    let mut tested = choices.clone();
    if let Some((branch_id, option_id)) = new_choice {
        tested.insert(branch_id.to_string(), option_id.to_string());
    }

    let index = StoryIndex::new(messages, nodes);
    let mut visited: HashSet<&str> = HashSet::new();

    // Revisited branches are reported as loops here, so let the visitor see
    // them before the walker's own branch guard does.
    let end = index.walk(
        &tested,
        Some(messages.len() * 2),
        |_| {},
        |message| visited.insert(message.id.as_str()),
    );

    match end {
        WalkEnd::Revisited | WalkEnd::Exhausted => {
            warn!(?end, "Branch choices form a loop");
            true
        }
        WalkEnd::Finished | WalkEnd::Stopped => false,
    }
}

/// The active path as it would be after choosing `option_id` at `branch_id`.
pub fn path_preview(
    branch_id: &str,
    option_id: &str,
    messages: &[Message],
    nodes: &[Node],
    choices: &BranchChoices,
) -> ActivePath {
    let mut preview = choices.clone();
    preview.insert(branch_id.to_string(), option_id.to_string());
    resolve_active_path(messages, nodes, &preview)
}
