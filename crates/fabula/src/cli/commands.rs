//! CLI command definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use fabula::ContextType;
use std::path::PathBuf;

/// Fabula - tiered, branch-aware context assembly for story generation
#[derive(Parser, Debug)]
#[command(name = "fabula")]
#[command(about = "Tiered, branch-aware context assembly for story generation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of the layered defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the context that would be sent for the next turn, as JSON
    Assemble(AssembleArgs),

    /// Print size estimates for a story
    Stats {
        #[command(flatten)]
        story: StoryArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Context window to check against, in tokens (defaults to the model's)
        #[arg(long)]
        window: Option<usize>,
    },

    /// Print the active path implied by the story's branch choices
    Path {
        #[command(flatten)]
        story: StoryArgs,
    },
}

/// Story file selection
#[derive(Args, Debug)]
pub struct StoryArgs {
    /// Path to the story JSON file
    #[arg(long)]
    pub story: PathBuf,
}

/// Target model selection
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Provider serving the model
    #[arg(long, default_value = "anthropic")]
    pub provider: String,

    /// Model identifier
    #[arg(long, default_value = "claude-sonnet-4-5")]
    pub model: String,
}

/// Arguments of `fabula assemble`
#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[command(flatten)]
    pub story: StoryArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// The author's direction (or question, for query contexts)
    #[arg(long)]
    pub input: String,

    /// What the context is for
    #[arg(long, value_enum, default_value = "story")]
    pub context_type: ContextTypeArg,

    /// Message that anchors the current chapter
    #[arg(long)]
    pub target: Option<String>,

    /// Proceed even when earlier chapters lack summaries
    #[arg(long)]
    pub force: bool,

    /// Requested paragraphs per turn
    #[arg(long)]
    pub paragraphs: Option<u32>,

    /// Replay prior Q&A turns in query contexts
    #[arg(long)]
    pub query_history: bool,
}

/// Context type as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ContextTypeArg {
    /// Continue the story
    Story,
    /// Answer a question about the story
    Query,
    /// Continue from an analyzer-selected subset
    SmartStory,
}

impl From<ContextTypeArg> for ContextType {
    fn from(arg: ContextTypeArg) -> Self {
        match arg {
            ContextTypeArg::Story => ContextType::Story,
            ContextTypeArg::Query => ContextType::Query,
            ContextTypeArg::SmartStory => ContextType::SmartStory,
        }
    }
}
