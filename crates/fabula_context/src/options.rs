//! Inputs of one context assembly call.

use crate::{ModelProfile, StoryVoice};
use fabula_core::{BranchChoices, Chapter, Character, ContextItem, Message, Node};
use fabula_error::{ContextError, ContextErrorKind};
use fabula_interface::ContextType;

/// Everything the assembler reads for one call.
///
/// The story records are read-only for the duration of the call.
///
/// # Examples
///
/// ```
/// use fabula_context::ContextOptions;
/// use fabula_core::Message;
/// use fabula_interface::ContextType;
///
/// let options = ContextOptions::builder()
///     .input_text("The caravan arrives.")
///     .messages(vec![Message::narrative("m1", 1, "Dust on the horizon.")])
///     .context_type(ContextType::Story)
///     .build()
///     .unwrap();
///
/// assert!(!options.force_missing_summaries);
/// ```
#[derive(Debug, Clone, Default, PartialEq, derive_builder::Builder)]
#[builder(default, setter(into), build_fn(validate = "Self::validate"))]
pub struct ContextOptions {
    /// The author's direction, or the question for query contexts
    pub input_text: String,
    /// The whole timeline, in storage order
    pub messages: Vec<Message>,
    /// What the context is for
    pub context_type: ContextType,
    /// Narrative voice
    pub voice: StoryVoice,
    /// Pre-rendered character and world context
    #[builder(setter(into, strip_option))]
    pub character_context: Option<String>,
    /// Characters, passed to the scene-relevance analyzer
    pub characters: Vec<Character>,
    /// World-building items, passed to the scene-relevance analyzer
    pub context_items: Vec<ContextItem>,
    /// Legacy chapter records, used when there are no nodes
    pub chapters: Vec<Chapter>,
    /// The node tree
    pub nodes: Vec<Node>,
    /// Message that anchors the current container
    #[builder(setter(into, strip_option))]
    pub target_message_id: Option<String>,
    /// Branch message id -> chosen option id
    pub branch_choices: BranchChoices,
    /// Target model
    pub model: ModelProfile,
    /// Replay prior Q&A turns in query contexts
    pub include_query_history: bool,
    /// Overrides the configured number of replayed Q&A pairs
    #[builder(setter(into, strip_option))]
    pub max_query_history: Option<usize>,
    /// Proceed even when earlier chapters lack summaries
    pub force_missing_summaries: bool,
}

impl ContextOptions {
    /// Creates a new options builder.
    pub fn builder() -> ContextOptionsBuilder {
        ContextOptionsBuilder::default()
    }
}

impl ContextOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        let blank_target = matches!(&self.target_message_id, Some(Some(target)) if target.trim().is_empty());
        if blank_target {
            return Err("target_message_id must not be blank".to_string());
        }
        if self.context_type == Some(ContextType::Query) && self.max_query_history == Some(Some(0)) {
            return Err("max_query_history must be at least 1 for query contexts".to_string());
        }
        Ok(())
    }
}

impl From<ContextOptionsBuilderError> for ContextError {
    #[track_caller]
    fn from(err: ContextOptionsBuilderError) -> Self {
        ContextError::new(ContextErrorKind::InvalidOptions(err.to_string()))
    }
}
