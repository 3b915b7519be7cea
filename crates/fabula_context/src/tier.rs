//! Tiered summarizer selection.
//!
//! The further a message is from the generation point, the coarser its
//! representation. Assembly and estimation both go through [`select_fidelity`]
//! so that what the author is shown matches what is sent.

use crate::ContextSettings;
use fabula_core::Message;
use serde::{Deserialize, Serialize};

/// Representation of a message in context, ordered coarsest first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// One-sentence summary
    #[display("sentence")]
    Sentence,
    /// One-paragraph summary
    #[display("paragraph")]
    Paragraph,
    /// Full content
    #[display("full")]
    Full,
}

impl Fidelity {
    /// The text of `message` at this fidelity.
    ///
    /// Falls back to the full content when the summary is absent, so callers
    /// should pass a fidelity obtained from [`select_fidelity`].
    pub fn render(self, message: &Message) -> &str {
        let summary = match self {
            Fidelity::Sentence => message.sentence_summary(),
            Fidelity::Paragraph => message.paragraph_summary(),
            Fidelity::Full => None,
        };
        summary.unwrap_or(&message.content)
    }
}

/// Chooses the fidelity for one message.
///
/// `turns_from_end` is `total - position` where `position` is 1-based within
/// the messages being assembled for the current container, so the last
/// message has `0`.
///
/// - Compacted messages are always full.
/// - When `always_full_current` is set and the message belongs to the current
///   container, it is full.
/// - Beyond `sentence_summary_after` turns the sentence summary is used when
///   present; beyond `paragraph_summary_after` the paragraph summary is used
///   when present; otherwise the content is sent in full.
///
/// # Examples
///
/// ```
/// use fabula_context::{ContextSettings, Fidelity, select_fidelity};
/// use fabula_core::MessageBuilder;
///
/// let msg = MessageBuilder::default()
///     .id("m")
///     .content("Full text.")
///     .sentence_summary("Short.")
///     .paragraph_summary("Medium.")
///     .build()
///     .unwrap();
/// let settings = ContextSettings::default();
///
/// assert_eq!(select_fidelity(&msg, 19, false, true, &settings), Fidelity::Sentence);
/// assert_eq!(select_fidelity(&msg, 10, false, true, &settings), Fidelity::Paragraph);
/// assert_eq!(select_fidelity(&msg, 2, false, true, &settings), Fidelity::Full);
/// assert_eq!(select_fidelity(&msg, 19, true, true, &settings), Fidelity::Full);
/// ```
pub fn select_fidelity(
    message: &Message,
    turns_from_end: usize,
    always_full_current: bool,
    is_current_container: bool,
    settings: &ContextSettings,
) -> Fidelity {
    if message.is_compacted || (always_full_current && is_current_container) {
        return Fidelity::Full;
    }

    if turns_from_end > *settings.sentence_summary_after() && message.sentence_summary().is_some() {
        Fidelity::Sentence
    } else if turns_from_end > *settings.paragraph_summary_after()
        && message.paragraph_summary().is_some()
    {
        Fidelity::Paragraph
    } else {
        Fidelity::Full
    }
}

/// A message rendered for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieredMessage<'a> {
    /// Source message
    pub message: &'a Message,
    /// Fidelity chosen
    pub fidelity: Fidelity,
    /// Text at that fidelity
    pub content: &'a str,
}

/// Renders a run of messages with distances measured from its end.
pub fn tier_messages<'a>(
    messages: &[&'a Message],
    always_full_current: bool,
    is_current_container: bool,
    settings: &ContextSettings,
) -> Vec<TieredMessage<'a>> {
    let total = messages.len();
    messages
        .iter()
        .enumerate()
        .map(|(index, &message)| {
            let turns_from_end = total - (index + 1);
            let fidelity = select_fidelity(
                message,
                turns_from_end,
                always_full_current,
                is_current_container,
                settings,
            );
            TieredMessage {
                message,
                fidelity,
                content: fidelity.render(message),
            }
        })
        .collect()
}
