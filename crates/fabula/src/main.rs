//! Fabula CLI binary.
//!
//! This binary provides command-line access to the context engine:
//! - Assemble the context for the next turn of a story
//! - Estimate story size against a model's context window
//! - Show the active path through a branching story

use clap::Parser;
use fabula::{FabulaConfig, FabulaError, FabulaResult};
use std::process::ExitCode;

mod cli;

use cli::{Cli, Commands, handle_assemble, handle_path, handle_stats};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    fabula::telemetry::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", author_message(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> FabulaResult<()> {
    let config = match &cli.config {
        Some(path) => FabulaConfig::from_file(path)?,
        None => FabulaConfig::load()?,
    };

    match cli.command {
        Commands::Assemble(args) => handle_assemble(args, &config).await,
        Commands::Stats {
            story,
            model,
            window,
        } => handle_stats(story, model, window, &config),
        Commands::Path { story } => handle_path(story),
    }
}

/// Validation errors are shown without source locations; the author acts on them.
fn author_message(err: &FabulaError) -> String {
    match err.as_context() {
        Some(context) if err.is_recoverable_by_caller() => context.message(),
        _ => err.to_string(),
    }
}
