//! Tests for tier selection and context estimation.

use fabula_context::{
    ContextAssembler, ContextOptions, ContextSettings, Fidelity, ModelCapabilities, ModelProfile,
    estimate_context, estimate_story, messages_in_context, select_fidelity, tier_messages,
};
use fabula_core::{
    BranchChoices, BranchOption, ChatMessage, Message, MessageKind, Node, NodeBuilder,
};

fn summarized(i: usize) -> Message {
    let mut msg = Message::narrative(format!("m{}", i), i as i64, format!("The full text of beat {}.", i));
    msg.sentence_summary = Some(format!("S{}.", i));
    msg.paragraph_summary = Some(format!("Paragraph {}.", i));
    msg
}

fn story(count: usize) -> Vec<Message> {
    (1..=count).map(summarized).collect()
}

fn always_full() -> ModelProfile {
    let caps = ModelCapabilities::builder()
        .treats_current_container_as_always_full(true)
        .build()
        .unwrap();
    ModelProfile::new("claude-opus-4", "anthropic", caps)
}

#[test]
fn test_fidelity_never_coarsens_toward_the_end() {
    let settings = ContextSettings::default();

    for count in [1, 8, 9, 15, 16, 40] {
        let messages = story(count);
        let refs: Vec<&Message> = messages.iter().collect();
        let tiered = tier_messages(&refs, false, true, &settings);

        for pair in tiered.windows(2) {
            assert!(
                pair[0].fidelity <= pair[1].fidelity,
                "{} before {} in a story of {}",
                pair[0].fidelity,
                pair[1].fidelity,
                count
            );
        }
        assert_eq!(tiered.last().unwrap().fidelity, Fidelity::Full);
    }
}

#[test]
fn test_custom_thresholds() {
    let settings = ContextSettings::default().with_tier_thresholds(3, 1);
    let msg = summarized(1);

    assert_eq!(select_fidelity(&msg, 4, false, true, &settings), Fidelity::Sentence);
    assert_eq!(select_fidelity(&msg, 3, false, true, &settings), Fidelity::Paragraph);
    assert_eq!(select_fidelity(&msg, 1, false, true, &settings), Fidelity::Full);
}

#[test]
fn test_previous_container_ignores_always_full() {
    let settings = ContextSettings::default();
    let msg = summarized(1);

    assert_eq!(select_fidelity(&msg, 30, true, false, &settings), Fidelity::Sentence);
    assert_eq!(select_fidelity(&msg, 30, true, true, &settings), Fidelity::Full);
}

fn flat_options(messages: Vec<Message>, model: ModelProfile) -> ContextOptions {
    ContextOptions::builder()
        .input_text("Onward.")
        .messages(messages)
        .model(model)
        .build()
        .unwrap()
}

fn chapter(id: &str, order: i64, summary: Option<&str>) -> Node {
    let mut builder = NodeBuilder::default();
    builder.id(id).title(format!("Chapter {}", id)).order(order);
    if let Some(summary) = summary {
        builder.summary(summary);
    }
    builder.build().unwrap()
}

fn in_node(mut message: Message, node: &str) -> Message {
    message.node_id = Some(node.to_string());
    message
}

/// Characters of the story blocks: everything between the system prompt and
/// the closing directive.
fn story_chars(blocks: &[ChatMessage]) -> usize {
    blocks[1..blocks.len() - 1]
        .iter()
        .map(|b| b.content.chars().count())
        .sum()
}

#[test]
fn test_story_estimate_counts_tiers() {
    let settings = ContextSettings::default();
    let stats = estimate_story(&flat_options(story(20), ModelProfile::default()), &settings);

    assert_eq!(stats.tiers.sentence, 5);
    assert_eq!(stats.tiers.paragraph, 7);
    assert_eq!(stats.tiers.full, 8);
    assert_eq!(stats.blocks, 20);
    assert_eq!(stats.word_count, 20 * 6);
    assert_eq!(stats.estimated_tokens, stats.char_count.div_ceil(4));

    let full = estimate_story(&flat_options(story(20), always_full()), &settings);
    assert_eq!(full.tiers.full, 20);
    assert!(full.char_count > stats.char_count);
}

#[test]
fn test_queries_are_not_counted() {
    let mut messages = story(2);
    let mut query = Message::narrative("q", 3, "An answer about the story.");
    query.is_query = true;
    messages.push(query);

    let stats = estimate_story(
        &flat_options(messages, ModelProfile::default()),
        &ContextSettings::default(),
    );
    assert_eq!(stats.tiers.full, 2);
}

#[test]
fn test_blank_messages_are_not_counted() {
    let mut messages = story(2);
    messages.push(Message::narrative("blank", 3, "   "));

    let options = flat_options(messages, ModelProfile::default());
    let stats = estimate_story(&options, &ContextSettings::default());
    let blocks = ContextAssembler::default().assemble(&options).unwrap();

    assert_eq!(stats.blocks, 2);
    assert_eq!(stats.char_count, story_chars(&blocks));
}

#[test]
fn test_chaptered_estimate_matches_assembled_story() {
    let mut messages: Vec<Message> = (1..=20)
        .map(|i| in_node(Message::narrative(format!("a{}", i), i, format!("Old beat number {}.", i)), "c1"))
        .collect();
    messages.push(in_node(Message::narrative("b1", 1, "New beat."), "c2"));

    let options = ContextOptions::builder()
        .input_text("Continue.")
        .messages(messages)
        .nodes(vec![
            chapter("c1", 1, Some("Twenty beats passed.")),
            chapter("c2", 2, None),
        ])
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let stats = estimate_story(&options, &ContextSettings::default());

    assert_eq!(stats.char_count, story_chars(&blocks));
    assert_eq!(stats.blocks, blocks.len() - 2);
    assert_eq!(stats.tiers.container_summaries, 1);
    assert_eq!(stats.tiers.full, 1);
    assert_eq!(stats.word_count, 20 * 4 + 2);
}

#[test]
fn test_estimate_follows_the_active_path() {
    let mut fork = in_node(Message::narrative("fork", 2, "Left or right?"), "c1");
    fork.kind = Some(MessageKind::Branch);
    fork.options = vec![
        BranchOption {
            id: "left".to_string(),
            label: "Left".to_string(),
            target_node_id: "c1".to_string(),
            target_message_id: "l1".to_string(),
            description: None,
        },
        BranchOption {
            id: "right".to_string(),
            label: "Right".to_string(),
            target_node_id: "c1".to_string(),
            target_message_id: "r1".to_string(),
            description: None,
        },
    ];
    let messages = vec![
        in_node(Message::narrative("start", 1, "At the crossroads."), "c1"),
        fork,
        in_node(Message::narrative("l1", 3, "The left road was long and dusty."), "c1"),
        in_node(Message::narrative("r1", 4, "Right."), "c1"),
    ];
    let mut choices = BranchChoices::new();
    choices.insert("fork".to_string(), "right".to_string());

    let options = ContextOptions::builder()
        .input_text("Walk on.")
        .messages(messages)
        .nodes(vec![chapter("c1", 1, None)])
        .branch_choices(choices)
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let stats = estimate_story(&options, &ContextSettings::default());

    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.char_count, story_chars(&blocks));
    assert!(!messages_in_context(&options, 100_000, &ContextSettings::default()).contains("l1"));
}

#[test]
fn test_messages_in_context_keeps_recent_suffix() {
    let settings = ContextSettings::default();
    let options = flat_options(story(10), always_full());

    let everything = messages_in_context(&options, 100_000, &settings);
    assert_eq!(everything.len(), 10);

    // Each full beat is 24-25 characters, so about 7 tokens.
    let recent = messages_in_context(&options, 20, &settings);
    assert!(recent.contains("m10"));
    assert!(recent.contains("m9"));
    assert!(!recent.contains("m1"));
    assert!(recent.len() < 10);
}

#[test]
fn test_summary_block_represents_its_chapter() {
    let messages = vec![
        in_node(Message::narrative("a1", 1, "Long ago."), "c1"),
        in_node(Message::narrative("a2", 2, "Far away."), "c1"),
        in_node(Message::narrative("b1", 1, "Now."), "c2"),
    ];
    let options = ContextOptions::builder()
        .messages(messages)
        .nodes(vec![chapter("c1", 1, Some("Once.")), chapter("c2", 2, None)])
        .build()
        .unwrap();

    let ids = messages_in_context(&options, 100_000, &ContextSettings::default());
    assert_eq!(ids.len(), 3);
    assert!(ids.contains("a2"));
}

#[test]
fn test_context_estimate_sums_blocks() {
    let options = flat_options(story(3), ModelProfile::default());
    let blocks = ContextAssembler::default().assemble(&options).unwrap();

    let estimate = estimate_context(&blocks, 4.0);
    let chars: usize = blocks.iter().map(|b| b.content.chars().count()).sum();

    assert_eq!(estimate.char_count, chars);
    assert_eq!(estimate.estimated_tokens, chars.div_ceil(4));
    assert_eq!(estimate.cached_blocks, 0);
    assert!(estimate.fits(&ModelProfile::default()));
}
