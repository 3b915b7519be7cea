//! Context-size estimation for display.
//!
//! Story estimates are sized from the same rendered blocks the assembler
//! sends, so the numbers shown to the author match what is sent.

use crate::assembler::{StoryView, render_story};
use crate::{ContextOptions, ContextSettings, Fidelity, ModelProfile};
use fabula_core::ChatMessage;
use serde::Serialize;
use std::collections::HashSet;

/// How many messages rendered at each fidelity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    /// Sentence summaries
    pub sentence: usize,
    /// Paragraph summaries
    pub paragraph: usize,
    /// Full content
    pub full: usize,
    /// Chapter summary blocks standing in for a whole previous container
    pub container_summaries: usize,
}

/// Size of a story as it would be rendered for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoryStats {
    /// Words in the full text of the narrative on the active path
    pub word_count: usize,
    /// Characters over the rendered story blocks
    pub char_count: usize,
    /// Estimated tokens of the rendered story blocks
    pub estimated_tokens: usize,
    /// Story blocks that would be sent
    pub blocks: usize,
    /// Fidelity breakdown
    pub tiers: TierCounts,
}

/// Size of an assembled context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextEstimate {
    /// Characters over all blocks
    pub char_count: usize,
    /// Estimated tokens over all blocks
    pub estimated_tokens: usize,
    /// Blocks carrying a cache hint
    pub cached_blocks: usize,
}

impl ContextEstimate {
    /// Whether the estimate fits the model's context window.
    ///
    /// Models with an unknown window are assumed to fit.
    pub fn fits(&self, profile: &ModelProfile) -> bool {
        (*profile.capabilities().context_window())
            .is_none_or(|window| self.estimated_tokens <= window)
    }

    /// Tokens left in the model's window, when the window is known.
    pub fn remaining(&self, profile: &ModelProfile) -> Option<usize> {
        (*profile.capabilities().context_window())
            .map(|window| window.saturating_sub(self.estimated_tokens))
    }
}

fn tokens_for(chars: usize, chars_per_token: f64) -> usize {
    (chars as f64 / chars_per_token).ceil() as usize
}

/// Word, character and token counts for the story part of a context.
///
/// Sized from exactly the story blocks [`ContextAssembler::assemble`]
/// would emit for `options`: active path, container inclusion modes, per
/// container tiering and dropped blank blocks all apply. Validation does
/// not, so a story that would be refused for missing summaries is sized as
/// if forced.
///
/// [`ContextAssembler::assemble`]: crate::ContextAssembler::assemble
///
/// # Examples
///
/// ```
/// use fabula_context::{ContextOptions, ContextSettings, estimate_story};
/// use fabula_core::Message;
///
/// let options = ContextOptions::builder()
///     .messages(vec![
///         Message::narrative("m1", 1, "One two three."),
///         Message::narrative("m2", 2, "Four five."),
///     ])
///     .build()
///     .unwrap();
/// let stats = estimate_story(&options, &ContextSettings::default());
///
/// assert_eq!(stats.word_count, 5);
/// assert_eq!(stats.char_count, "One two three.Four five.".len());
/// assert_eq!(stats.tiers.full, 2);
/// ```
pub fn estimate_story(options: &ContextOptions, settings: &ContextSettings) -> StoryStats {
    let view = StoryView::new(options);
    let story = render_story(&view, &options.model, settings);

    let word_count = view
        .spine()
        .iter()
        .map(|m| m.content.split_whitespace().count())
        .sum();

    let mut tiers = TierCounts::default();
    for block in &story.blocks {
        match block.fidelity {
            Some(Fidelity::Sentence) => tiers.sentence += 1,
            Some(Fidelity::Paragraph) => tiers.paragraph += 1,
            Some(Fidelity::Full) => tiers.full += 1,
            None if !block.message_ids.is_empty() => tiers.container_summaries += 1,
            None => {}
        }
    }

    let char_count = story
        .blocks
        .iter()
        .map(|block| block.content.chars().count())
        .sum();

    StoryStats {
        word_count,
        char_count,
        estimated_tokens: tokens_for(char_count, *settings.chars_per_token()),
        blocks: story.blocks.len(),
        tiers,
    }
}

/// Ids of the messages represented in the story blocks that fit in
/// `window_tokens`.
///
/// All represented messages when the rendered story fits; otherwise those of
/// the longest run of trailing blocks that fits. A chapter summary block
/// represents every message of its chapter. Skipped chapters are never
/// represented.
pub fn messages_in_context(
    options: &ContextOptions,
    window_tokens: usize,
    settings: &ContextSettings,
) -> HashSet<String> {
    let view = StoryView::new(options);
    let story = render_story(&view, &options.model, settings);
    let chars_per_token = *settings.chars_per_token();

    let total_chars: usize = story.blocks.iter().map(|b| b.content.chars().count()).sum();
    if tokens_for(total_chars, chars_per_token) <= window_tokens {
        return story
            .blocks
            .iter()
            .flat_map(|block| block.message_ids.iter().map(|id| id.to_string()))
            .collect();
    }

    let mut used = 0;
    let mut fitting = HashSet::new();
    for block in story.blocks.iter().rev() {
        let tokens = tokens_for(block.content.chars().count(), chars_per_token);
        if used + tokens > window_tokens {
            break;
        }
        used += tokens;
        fitting.extend(block.message_ids.iter().map(|id| id.to_string()));
    }
    fitting
}

/// Size of an assembled block list.
pub fn estimate_context(blocks: &[ChatMessage], chars_per_token: f64) -> ContextEstimate {
    let char_count = blocks.iter().map(|b| b.content.chars().count()).sum();
    ContextEstimate {
        char_count,
        estimated_tokens: tokens_for(char_count, chars_per_token),
        cached_blocks: blocks.iter().filter(|b| b.is_cached()).count(),
    }
}
