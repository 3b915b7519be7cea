//! Fabula - story context engine
//!
//! Fabula decides which prior narrative content is sent to a language model
//! when continuing a long, possibly branching story: at what fidelity, in
//! what order, with which cache hints, and when to refuse because a chapter
//! that carries the story still lacks a summary.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fabula::{ContextAssembler, ContextOptions, FabulaConfig, StoryFile, generate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FabulaConfig::load()?;
//!     let story = StoryFile::load("story.json")?;
//!
//!     let options = ContextOptions::builder()
//!         .input_text("The storm breaks.")
//!         .messages(story.messages)
//!         .nodes(story.nodes)
//!         .branch_choices(story.branch_choices)
//!         .model(config.capabilities("anthropic", "claude-sonnet-4-5"))
//!         .build()?;
//!
//!     let assembler = ContextAssembler::from_config(&config);
//!     let interrupted = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     let outcome = generate(&assembler, &my_backend, &options, None, interrupted).await?;
//!     println!("{}", outcome.text);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Fabula is organized as a workspace with focused crates:
//!
//! - `fabula_error` - Error types
//! - `fabula_core` - Story records and chat blocks
//! - `fabula_interface` - Generation backend, analyzer and activity sink traits
//! - `fabula_context` - Traversal, branch resolution, tiering and assembly
//!
//! This crate (`fabula`) re-exports everything for convenience and adds
//! stream collection and the `fabula` binary.

#![forbid(unsafe_code)]

mod generation;
mod story;
pub mod telemetry;

pub use fabula_context::*;
pub use fabula_core::*;
pub use fabula_error::*;
pub use fabula_interface::*;

pub use generation::{GenerationOutcome, collect_generation, generate};
pub use story::StoryFile;
