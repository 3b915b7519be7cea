//! `fabula assemble` handler.

use super::AssembleArgs;
use fabula::{
    ContextAssembler, ContextError, ContextOptions, ContextType, FabulaConfig, FabulaResult,
    JsonError, StoryFile, StoryVoice, TracingActivitySink, estimate_context,
};
use std::sync::Arc;
use tracing::info;

/// Assembles the context for the next turn and prints it as JSON.
pub async fn handle_assemble(args: AssembleArgs, config: &FabulaConfig) -> FabulaResult<()> {
    let story = StoryFile::load(&args.story.story)?;
    let profile = config.capabilities(&args.model.provider, &args.model.model);

    let voice = StoryVoice {
        paragraphs_per_turn: args.paragraphs,
        ..StoryVoice::default()
    };

    let mut builder = ContextOptions::builder();
    builder
        .input_text(args.input)
        .messages(story.messages)
        .nodes(story.nodes)
        .chapters(story.chapters)
        .branch_choices(story.branch_choices)
        .context_type(ContextType::from(args.context_type))
        .voice(voice)
        .model(profile.clone())
        .include_query_history(args.query_history)
        .force_missing_summaries(args.force);
    if let Some(target) = args.target {
        builder.target_message_id(target);
    }
    let options = builder.build().map_err(ContextError::from)?;

    let assembler =
        ContextAssembler::from_config(config).with_activity_sink(Arc::new(TracingActivitySink));
    let blocks = assembler.generate_context_messages(&options).await?;

    let estimate = estimate_context(&blocks, *assembler.settings().chars_per_token());
    info!(
        blocks = blocks.len(),
        estimated_tokens = estimate.estimated_tokens,
        fits = estimate.fits(&profile),
        "Assembled context"
    );

    let json = serde_json::to_string_pretty(&blocks).map_err(JsonError::from)?;
    println!("{}", json);
    Ok(())
}
