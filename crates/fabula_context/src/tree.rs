//! Story-order traversal of the node tree.
//!
//! Story order is a depth-first walk from the roots with siblings sorted by
//! `order`. Creation time plays no part.

use fabula_core::{Message, Node};
use fabula_error::{ContextError, ContextErrorKind, FabulaResult};
use std::collections::{HashMap, HashSet};

/// Parent id -> children sorted by `order`.
///
/// Nodes whose parent is missing from the set are treated as roots so that a
/// partially loaded tree still has a usable order.
fn children_by_parent(nodes: &[Node]) -> HashMap<Option<&str>, Vec<&Node>> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut children: HashMap<Option<&str>, Vec<&Node>> = HashMap::new();

    for node in nodes {
        let parent = node
            .parent_id
            .as_deref()
            .filter(|parent| known.contains(parent));
        children.entry(parent).or_default().push(node);
    }

    for siblings in children.values_mut() {
        siblings.sort_by_key(|n| n.order);
    }

    children
}

/// Depth-first walk calling `visit` for each node.
///
/// Stops as soon as `visit` returns `true`; the return value reports whether
/// that happened. Cycles are cut by tracking visited ids.
fn walk<'a>(
    children: &HashMap<Option<&'a str>, Vec<&'a Node>>,
    parent: Option<&'a str>,
    seen: &mut HashSet<&'a str>,
    visit: &mut dyn FnMut(&'a Node) -> bool,
) -> bool {
    let Some(siblings) = children.get(&parent) else {
        return false;
    };

    for &node in siblings {
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        if visit(node) {
            return true;
        }
        if walk(children, Some(node.id.as_str()), seen, visit) {
            return true;
        }
    }

    false
}

/// Every node in story order.
///
/// # Examples
///
/// ```
/// use fabula_context::nodes_in_story_order;
/// use fabula_core::{NodeBuilder, NodeKind};
///
/// let nodes = vec![
///     NodeBuilder::default().id("ch2").parent_id("arc").order(2).build().unwrap(),
///     NodeBuilder::default().id("arc").kind(NodeKind::Arc).build().unwrap(),
///     NodeBuilder::default().id("ch1").parent_id("arc").order(1).build().unwrap(),
/// ];
///
/// let ids: Vec<_> = nodes_in_story_order(&nodes).iter().map(|n| n.id.as_str()).collect();
/// assert_eq!(ids, vec!["arc", "ch1", "ch2"]);
/// ```
pub fn nodes_in_story_order(nodes: &[Node]) -> Vec<&Node> {
    let children = children_by_parent(nodes);
    let mut result = Vec::with_capacity(nodes.len());
    walk(&children, None, &mut HashSet::new(), &mut |node| {
        result.push(node);
        false
    });
    result
}

/// Chapter nodes in story order.
pub fn chapters_in_story_order(nodes: &[Node]) -> Vec<&Node> {
    nodes_in_story_order(nodes)
        .into_iter()
        .filter(|n| n.is_chapter())
        .collect()
}

/// Chapter nodes strictly before `node_id` in story order.
///
/// Empty when `node_id` is unknown. Chapters nested under the node itself are
/// not "before" it.
pub fn chapter_nodes_before<'a>(nodes: &'a [Node], node_id: &str) -> Vec<&'a Node> {
    if !nodes.iter().any(|n| n.id == node_id) {
        return Vec::new();
    }

    let children = children_by_parent(nodes);
    let mut result = Vec::new();
    walk(&children, None, &mut HashSet::new(), &mut |node| {
        if node.id == node_id {
            return true;
        }
        if node.is_chapter() {
            result.push(node);
        }
        false
    });
    result
}

/// All nodes up to and including `node_id` in story order.
///
/// Empty when `node_id` is unknown.
pub fn nodes_up_to<'a>(nodes: &'a [Node], node_id: &str) -> Vec<&'a Node> {
    if !nodes.iter().any(|n| n.id == node_id) {
        return Vec::new();
    }

    let children = children_by_parent(nodes);
    let mut result = Vec::new();
    walk(&children, None, &mut HashSet::new(), &mut |node| {
        result.push(node);
        node.id == node_id
    });
    result
}

/// Messages grouped by node id, each group sorted by `order`.
pub(crate) fn messages_by_node(messages: &[Message]) -> HashMap<&str, Vec<&Message>> {
    let mut grouped: HashMap<&str, Vec<&Message>> = HashMap::new();
    for message in messages {
        if let Some(node_id) = message.node_id.as_deref() {
            grouped.entry(node_id).or_default().push(message);
        }
    }
    for group in grouped.values_mut() {
        group.sort_by_key(|m| m.order);
    }
    grouped
}

/// Messages from the start of the story up to and including `target_id`.
///
/// Per-node message lists are sorted by `order` and concatenated in story
/// order. When the target has no node the raw array order is used instead.
///
/// # Errors
///
/// Returns [`ContextErrorKind::TargetNotFound`] when no message has the id.
pub fn messages_in_story_order<'a>(
    messages: &'a [Message],
    nodes: &[Node],
    target_id: &str,
) -> FabulaResult<Vec<&'a Message>> {
    let Some(position) = messages.iter().position(|m| m.id == target_id) else {
        return Err(ContextError::new(ContextErrorKind::TargetNotFound(target_id.to_string())).into());
    };

    let Some(target_node) = messages[position].node_id.as_deref() else {
        tracing::warn!(target_id, "Target message has no node, falling back to array order");
        return Ok(messages[..=position].iter().collect());
    };

    let grouped = messages_by_node(messages);
    let mut result = Vec::new();

    for node in nodes_up_to(nodes, target_node) {
        let node_messages = grouped.get(node.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);

        if node.id == target_node {
            for message in node_messages {
                result.push(*message);
                if message.id == target_id {
                    break;
                }
            }
            break;
        }
        result.extend(node_messages.iter().copied());
    }

    Ok(result)
}

/// Node id -> id of the nearest chapter at or above it.
///
/// Nodes with no chapter ancestor are absent.
pub(crate) fn node_chapters(nodes: &[Node]) -> HashMap<&str, &str> {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    nodes
        .iter()
        .filter_map(|node| {
            nearest_chapter(&by_id, &node.id).map(|chapter| (node.id.as_str(), chapter))
        })
        .collect()
}

/// Messages grouped by the chapter that contains their node.
///
/// A chapter's group covers its whole subtree, so scene messages sit with
/// their chapter. Each group is sorted by the story-order rank of the
/// message's node, then by `order`.
pub(crate) fn messages_by_chapter<'a>(
    messages: &'a [Message],
    nodes: &'a [Node],
) -> HashMap<&'a str, Vec<&'a Message>> {
    let chapter_of = node_chapters(nodes);
    let rank: HashMap<&str, usize> = nodes_in_story_order(nodes)
        .into_iter()
        .enumerate()
        .map(|(index, node)| (node.id.as_str(), index))
        .collect();

    let mut grouped: HashMap<&str, Vec<&Message>> = HashMap::new();
    for message in messages {
        let chapter = message
            .node_id
            .as_deref()
            .and_then(|node_id| chapter_of.get(node_id).copied());
        if let Some(chapter) = chapter {
            grouped.entry(chapter).or_default().push(message);
        }
    }

    for group in grouped.values_mut() {
        group.sort_by_key(|m| (node_rank(&rank, m), m.order));
    }
    grouped
}

/// Story-order rank of the message's node; unplaced nodes sort last.
pub(crate) fn node_rank(rank: &HashMap<&str, usize>, message: &Message) -> usize {
    message
        .node_id
        .as_deref()
        .and_then(|id| rank.get(id).copied())
        .unwrap_or(usize::MAX)
}

/// Message id -> id of its container.
///
/// A message's container is the nearest chapter node at or above the node it
/// is attached to, so scene messages belong to their chapter. Messages whose
/// node has no chapter ancestor are absent.
pub fn message_container_map(messages: &[Message], nodes: &[Node]) -> HashMap<String, String> {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut chapter_of: HashMap<&str, Option<&str>> = HashMap::new();
    let mut result = HashMap::new();

    for message in messages {
        let Some(node_id) = message.node_id.as_deref() else {
            continue;
        };

        let chapter = *chapter_of
            .entry(node_id)
            .or_insert_with(|| nearest_chapter(&by_id, node_id));

        if let Some(chapter) = chapter {
            result.insert(message.id.clone(), chapter.to_string());
        }
    }

    result
}

/// Nearest chapter at or above `node_id`.
fn nearest_chapter<'a>(by_id: &HashMap<&'a str, &'a Node>, node_id: &str) -> Option<&'a str> {
    let mut current = by_id.get(node_id).copied();
    // A path longer than the node count has a cycle.
    let mut steps = 0;

    while let Some(node) = current {
        if node.is_chapter() {
            return Some(node.id.as_str());
        }
        steps += 1;
        if steps > by_id.len() {
            return None;
        }
        current = node
            .parent_id
            .as_deref()
            .and_then(|parent| by_id.get(parent).copied());
    }

    None
}
