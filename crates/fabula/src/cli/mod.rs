//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the fabula binary.

mod assemble;
mod commands;
mod inspect;

pub use assemble::handle_assemble;
pub use commands::{AssembleArgs, Cli, Commands, ModelArgs, StoryArgs};
pub use inspect::{handle_path, handle_stats};
