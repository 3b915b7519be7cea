//! Context assembly and token-budget engine for Fabula.
//!
//! Given a (possibly branching) story tree and a cursor position, this crate
//! decides which prior narrative content is sent to a language model, at what
//! fidelity, in what order and with which cache hints. It refuses to proceed
//! when a load-bearing chapter lacks a summary.
//!
//! # Components
//!
//! - **Traversal**: story order over the node tree
//! - **Branch resolver**: the active path implied by branch choices
//! - **Tier selector**: full text, paragraph or sentence summary by distance
//! - **Assembler**: the ordered, role-tagged block list for one call
//! - **Estimation**: context-size numbers computed with the same rules
//! - **Configuration**: thresholds and per-model capabilities from TOML
//!
//! # Example
//!
//! ```rust,ignore
//! use fabula_context::{ContextAssembler, ContextOptions, FabulaConfig};
//!
//! # async fn example(story: fabula_context::ContextOptions) -> Result<(), Box<dyn std::error::Error>> {
//! let config = FabulaConfig::load()?;
//! let assembler = ContextAssembler::from_config(&config);
//!
//! let blocks = assembler.generate_context_messages(&story).await?;
//! println!("Sending {} blocks", blocks.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod activity;
mod assembler;
mod branch;
mod config;
mod estimate;
mod options;
mod prompt;
mod tier;
mod tree;

pub use activity::{NullActivitySink, RecordingActivitySink, TracingActivitySink};
pub use assembler::ContextAssembler;
pub use branch::{
    ActivePath, detect_path_loop, next_message_in_path, path_preview, resolve_active_path,
};
pub use config::{
    ContextSettings, FabulaConfig, ModelCapabilities, ModelCapabilitiesBuilder,
    ModelCapabilityOverrides, ModelProfile, ProviderConfig, StorySetting,
};
pub use estimate::{
    ContextEstimate, StoryStats, TierCounts, estimate_context, estimate_story, messages_in_context,
};
pub use options::{ContextOptions, ContextOptionsBuilder, ContextOptionsBuilderError};
pub use prompt::{
    Person, QUERY_SYSTEM_PROMPT, StoryVoice, StoryVoiceBuilder, Tense, query_directive,
    query_history_blocks, story_directive, story_system_prompt,
};
pub use tier::{Fidelity, TieredMessage, select_fidelity, tier_messages};
pub use tree::{
    chapter_nodes_before, chapters_in_story_order, message_container_map, messages_in_story_order,
    nodes_in_story_order, nodes_up_to,
};
