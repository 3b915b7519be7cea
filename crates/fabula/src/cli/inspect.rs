//! `fabula stats` and `fabula path` handlers.

use super::{ModelArgs, StoryArgs};
use fabula::{
    ContextError, ContextOptions, FabulaConfig, FabulaResult, JsonError, StoryFile,
    detect_path_loop, estimate_story, messages_in_context, resolve_active_path,
};
use serde_json::json;

fn print_json(value: &serde_json::Value) -> FabulaResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(JsonError::from)?;
    println!("{}", json);
    Ok(())
}

/// Prints word, character and token estimates for the story blocks a
/// continuation would send, and how much of the story fits the context
/// window.
pub fn handle_stats(
    story: StoryArgs,
    model: ModelArgs,
    window: Option<usize>,
    config: &FabulaConfig,
) -> FabulaResult<()> {
    let story = StoryFile::load(&story.story)?;
    let profile = config.capabilities(&model.provider, &model.model);

    let options = ContextOptions::builder()
        .messages(story.messages)
        .nodes(story.nodes)
        .chapters(story.chapters)
        .branch_choices(story.branch_choices)
        .model(profile.clone())
        .build()
        .map_err(ContextError::from)?;

    let stats = estimate_story(&options, &config.context);
    let window = window.or(*profile.capabilities().context_window());
    let in_context =
        window.map(|tokens| messages_in_context(&options, tokens, &config.context).len());

    print_json(&json!({
        "model": profile.id(),
        "provider": profile.provider(),
        "stats": stats,
        "window": window,
        "messages_in_context": in_context,
    }))
}

/// Prints the ids on the active path.
pub fn handle_path(story: StoryArgs) -> FabulaResult<()> {
    let story = StoryFile::load(&story.story)?;

    let path = resolve_active_path(&story.messages, &story.nodes, &story.branch_choices);
    let loops = detect_path_loop(&story.messages, &story.nodes, &story.branch_choices, None);

    print_json(&json!({
        "active_message_ids": path.active_message_ids,
        "active_node_ids": path.active_node_ids,
        "loops": loops,
    }))
}
