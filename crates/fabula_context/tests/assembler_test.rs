//! Tests for deterministic context assembly.

use fabula_context::{
    ContextAssembler, ContextOptions, ContextSettings, ModelCapabilities, ModelProfile,
    QUERY_SYSTEM_PROMPT, RecordingActivitySink, StoryVoiceBuilder,
};
use fabula_core::{
    BranchChoices, BranchOption, Chapter, ChatMessage, Inclusion, Message, MessageBuilder,
    MessageKind, Node, NodeBuilder, NodeKind, Role,
};
use fabula_error::ContextErrorKind;
use fabula_interface::{ActivityEvent, ContainerMode, ContextType};
use std::sync::Arc;

fn caching_model() -> ModelProfile {
    let caps = ModelCapabilities::builder()
        .supports_prompt_caching(true)
        .treats_current_container_as_always_full(true)
        .context_window(Some(200_000))
        .build()
        .unwrap();
    ModelProfile::new("claude-sonnet-4-5", "anthropic", caps)
}

fn plain_model() -> ModelProfile {
    ModelProfile::new("llama3", "ollama", ModelCapabilities::default())
}

fn beat(id: &str, order: i64) -> Message {
    MessageBuilder::default()
        .id(id)
        .order(order)
        .content(format!("Content of {}", id))
        .sentence_summary(format!("Sentence of {}", id))
        .paragraph_summary(format!("Paragraph of {}", id))
        .build()
        .unwrap()
}

fn beat_in(id: &str, node: &str, order: i64) -> Message {
    let mut msg = beat(id, order);
    msg.node_id = Some(node.to_string());
    msg
}

fn chapter(id: &str, title: &str, order: i64) -> Node {
    NodeBuilder::default()
        .id(id)
        .title(title)
        .order(order)
        .build()
        .unwrap()
}

fn summarized(id: &str, title: &str, order: i64) -> Node {
    let mut node = chapter(id, title, order);
    node.summary = Some(format!("{} in brief.", title));
    node
}

fn flat_story(count: usize) -> Vec<Message> {
    (1..=count).map(|i| beat(&i.to_string(), i as i64)).collect()
}

fn story_blocks(blocks: &[ChatMessage]) -> Vec<&str> {
    blocks
        .iter()
        .filter(|b| b.role == Role::Assistant)
        .map(|b| b.content.as_str())
        .collect()
}

#[test]
fn test_output_shape() {
    let options = ContextOptions::builder()
        .input_text("The door opens.")
        .messages(flat_story(3))
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();

    assert_eq!(blocks.len(), 5);
    assert_eq!(blocks[0].role, Role::System);
    assert!(blocks[0].content.contains("Continue the story based on the user's direction"));
    assert_eq!(story_blocks(&blocks), vec!["Content of 1", "Content of 2", "Content of 3"]);

    let directive = &blocks[4];
    assert_eq!(directive.role, Role::User);
    assert!(directive.content.contains("\"The door opens.\""));
    assert!(directive.content.ends_with("Continue the story directly below (no labels or formatting):"));
}

#[test]
fn test_assembly_is_deterministic() {
    let mut choices = BranchChoices::new();
    choices.insert("b1".to_string(), "A".to_string());
    let options = branching_options(choices, caching_model());
    let assembler = ContextAssembler::default();

    let first = assembler.assemble(&options).unwrap();
    let second = assembler.assemble(&options).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_flat_story_always_full_for_caching_model() {
    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(flat_story(20))
        .model(caching_model())
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let story = story_blocks(&blocks);

    assert_eq!(story.len(), 20);
    assert_eq!(story[0], "Content of 1");
    assert_eq!(story[19], "Content of 20");
}

#[test]
fn test_flat_story_tiers_for_plain_model() {
    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(flat_story(20))
        .model(plain_model())
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let story = story_blocks(&blocks);

    assert_eq!(story[0], "Sentence of 1");
    assert_eq!(story[9], "Paragraph of 10");
    assert_eq!(story[17], "Content of 18");
    assert!(blocks.iter().all(|b| !b.is_cached()));
}

#[test]
fn test_cache_hints_on_last_three_current_blocks() {
    let nodes = vec![summarized("c1", "Arrival", 1), chapter("c2", "Departure", 2)];
    let mut messages = vec![beat_in("a1", "c1", 1)];
    messages.extend((1..=5).map(|i| beat_in(&format!("d{}", i), "c2", i)));

    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(messages)
        .nodes(nodes)
        .model(caching_model())
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let cached: Vec<&str> = blocks
        .iter()
        .filter(|b| b.is_cached())
        .map(|b| b.content.as_str())
        .collect();

    assert_eq!(cached, vec!["Content of d3", "Content of d4", "Content of d5"]);
}

#[test]
fn test_short_current_container_caches_every_block() {
    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(flat_story(2))
        .model(caching_model())
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let cached = blocks.iter().filter(|b| b.is_cached()).count();
    assert_eq!(cached, 2);
}

#[test]
fn test_missing_summaries_listed_together() {
    let nodes = vec![
        chapter("c1", "The Road", 1),
        chapter("c2", "The River", 2),
        chapter("c3", "The Gate", 3),
    ];
    let messages = vec![
        beat_in("a1", "c1", 1),
        beat_in("b1", "c2", 1),
        beat_in("g1", "c3", 1),
    ];
    let builder = || {
        let mut builder = ContextOptions::builder();
        builder
            .input_text("Next.")
            .messages(messages.clone())
            .nodes(nodes.clone());
        builder
    };

    let err = ContextAssembler::default()
        .assemble(&builder().build().unwrap())
        .unwrap_err();

    assert!(err.is_recoverable_by_caller());
    let context_err = err.as_context().unwrap();
    assert_eq!(
        context_err.kind,
        ContextErrorKind::MissingSummaries(vec!["The Road".to_string(), "The River".to_string()])
    );
    assert!(context_err.message().contains("The Road, The River"));

    let forced = builder().force_missing_summaries(true).build().unwrap();
    let blocks = ContextAssembler::default().assemble(&forced).unwrap();
    assert_eq!(story_blocks(&blocks), vec!["Content of g1"]);
}

#[test]
fn test_empty_previous_chapter_needs_no_summary() {
    let nodes = vec![chapter("c1", "Blank", 1), chapter("c2", "Now", 2)];
    let mut blank = beat_in("a1", "c1", 1);
    blank.content = "   ".to_string();
    let messages = vec![blank, beat_in("n1", "c2", 1)];

    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(messages)
        .nodes(nodes)
        .build()
        .unwrap();

    assert!(ContextAssembler::default().assemble(&options).is_ok());
}

#[test]
fn test_skip_full_and_summary_inclusion() {
    let mut omitted = chapter("c1", "One", 1);
    omitted.include_in_full = Inclusion::Omit;
    let mut full = chapter("c2", "Two", 2);
    full.include_in_full = Inclusion::Full;
    let nodes = vec![
        omitted,
        full,
        summarized("c3", "Three", 3),
        chapter("c4", "Four", 4),
    ];
    let messages = vec![
        beat_in("a1", "c1", 1),
        beat_in("b2", "c2", 2),
        beat_in("b1", "c2", 1),
        beat_in("t1", "c3", 1),
        beat_in("f1", "c4", 1),
    ];

    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(messages)
        .nodes(nodes)
        .model(plain_model())
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    assert_eq!(
        story_blocks(&blocks),
        vec![
            "[Chapter: Two]",
            "Content of b1",
            "Content of b2",
            "[Chapter: Three]\nThree in brief.",
            "Content of f1",
        ]
    );
}

#[test]
fn test_full_inclusion_without_messages_uses_summary() {
    let mut full = summarized("c1", "Prologue", 1);
    full.include_in_full = Inclusion::Full;
    let nodes = vec![full, chapter("c2", "Now", 2)];

    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(vec![beat_in("n1", "c2", 1)])
        .nodes(nodes)
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    assert_eq!(
        story_blocks(&blocks),
        vec!["[Chapter: Prologue]\nPrologue in brief.", "Content of n1"]
    );
}

fn branching_options(choices: BranchChoices, model: ModelProfile) -> ContextOptions {
    // Story order: a, y, x. Option A jumps from a straight to x, so y is
    // chronologically earlier than x but off the chosen path.
    let nodes = vec![
        summarized("a", "Crossroads", 1),
        chapter("y", "Right Fork", 2),
        chapter("x", "Left Fork", 3),
    ];
    let mut branch = beat_in("b1", "a", 2);
    branch.content = "Which way?".to_string();
    branch.kind = Some(MessageKind::Branch);
    branch.options = vec![
        BranchOption {
            id: "A".to_string(),
            label: "Left".to_string(),
            target_node_id: "x".to_string(),
            target_message_id: "x1".to_string(),
            description: None,
        },
        BranchOption {
            id: "B".to_string(),
            label: "Right".to_string(),
            target_node_id: "y".to_string(),
            target_message_id: "y1".to_string(),
            description: None,
        },
    ];
    let messages = vec![
        beat_in("y1", "y", 1),
        beat_in("a1", "a", 1),
        branch,
        beat_in("x1", "x", 1),
        beat_in("x2", "x", 2),
    ];

    ContextOptions::builder()
        .input_text("Next.")
        .messages(messages)
        .nodes(nodes)
        .branch_choices(choices)
        .model(model)
        .build()
        .unwrap()
}

#[test]
fn test_unchosen_branch_never_appears() {
    let mut choices = BranchChoices::new();
    choices.insert("b1".to_string(), "A".to_string());
    let options = branching_options(choices, plain_model());

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let story = story_blocks(&blocks);

    assert!(!story.iter().any(|b| b.contains("y1")));
    assert_eq!(
        story,
        vec!["[Chapter: Crossroads]\nCrossroads in brief.", "Content of x1", "Content of x2"]
    );
}

#[test]
fn test_unresolved_branch_ends_story_at_branch() {
    let options = {
        let mut options = branching_options(BranchChoices::new(), plain_model());
        // Any recorded choice triggers path resolution; this one is for a
        // branch that does not exist, so b1 stays unresolved.
        options
            .branch_choices
            .insert("elsewhere".to_string(), "A".to_string());
        options
    };

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    assert_eq!(story_blocks(&blocks), vec!["Content of a1", "Which way?"]);
}

fn scene(id: &str, parent: &str, order: i64) -> Node {
    NodeBuilder::default()
        .id(id)
        .parent_id(parent)
        .kind(NodeKind::Scene)
        .order(order)
        .build()
        .unwrap()
}

#[test]
fn test_scene_messages_survive_branch_choices() {
    let nodes = vec![chapter("c1", "Arrival", 1), scene("s1", "c1", 1)];
    let messages = vec![beat_in("m1", "s1", 1), beat_in("m2", "s1", 2)];

    let linear = ContextOptions::builder()
        .input_text("Go on.")
        .messages(messages.clone())
        .nodes(nodes.clone())
        .build()
        .unwrap();
    let mut choices = BranchChoices::new();
    choices.insert("unrelated".to_string(), "A".to_string());
    let branching = ContextOptions::builder()
        .input_text("Go on.")
        .messages(messages)
        .nodes(nodes)
        .branch_choices(choices)
        .build()
        .unwrap();

    let assembler = ContextAssembler::default();
    let linear_blocks = assembler.assemble(&linear).unwrap();
    let branching_blocks = assembler.assemble(&branching).unwrap();

    assert_eq!(story_blocks(&linear_blocks), vec!["Content of m1", "Content of m2"]);
    assert_eq!(story_blocks(&branching_blocks), story_blocks(&linear_blocks));
    assert!(
        branching_blocks
            .last()
            .unwrap()
            .content
            .ends_with("Continue the story directly below (no labels or formatting):")
    );
}

#[test]
fn test_branch_from_scene_into_next_chapter() {
    let mut fork = beat_in("fork", "s1", 2);
    fork.kind = Some(MessageKind::Branch);
    fork.options = vec![BranchOption {
        id: "on".to_string(),
        label: "Press on".to_string(),
        target_node_id: "s2".to_string(),
        target_message_id: "n2".to_string(),
        description: None,
    }];
    let nodes = vec![
        summarized("c1", "Arrival", 1),
        scene("s1", "c1", 1),
        chapter("c2", "Departure", 2),
        scene("s2", "c2", 1),
    ];
    let messages = vec![
        beat_in("m1", "s1", 1),
        fork,
        beat_in("n1", "s2", 1),
        beat_in("n2", "s2", 2),
    ];
    let mut choices = BranchChoices::new();
    choices.insert("fork".to_string(), "on".to_string());

    let options = ContextOptions::builder()
        .input_text("Onward.")
        .messages(messages)
        .nodes(nodes)
        .branch_choices(choices)
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    assert_eq!(
        story_blocks(&blocks),
        vec!["[Chapter: Arrival]\nArrival in brief.", "Content of n2"]
    );
}

#[test]
fn test_oversized_flat_story() {
    let assembler = ContextAssembler::default();
    let options = |model: ModelProfile, force: bool| {
        ContextOptions::builder()
            .input_text("Next.")
            .messages(flat_story(51))
            .model(model)
            .force_missing_summaries(force)
            .build()
            .unwrap()
    };

    let err = assembler
        .assemble(&options(caching_model(), false))
        .unwrap_err();
    assert!(err.is_recoverable_by_caller());
    let message = err.as_context().unwrap().message();
    assert!(message.starts_with(
        "Story has 51 messages without chapter organization. Please organize into chapters with summaries before continuing."
    ));
    assert!(message.contains("claude-sonnet-4-5"));

    assert!(assembler.assemble(&options(caching_model(), true)).is_ok());
    assert!(assembler.assemble(&options(plain_model(), false)).is_ok());

    let at_limit = ContextOptions::builder()
        .input_text("Next.")
        .messages(flat_story(50))
        .model(caching_model())
        .build()
        .unwrap();
    assert!(assembler.assemble(&at_limit).is_ok());
}

#[test]
fn test_query_context_with_history() {
    let mut messages = flat_story(2);
    for i in 1..=3 {
        let mut query = Message::narrative(format!("q{}", i), 10 + i, format!("Answer {}", i));
        query.is_query = true;
        query.instruction = Some(format!("Question {}?", i));
        messages.push(query);
    }

    let options = ContextOptions::builder()
        .input_text("Who is the stranger?")
        .messages(messages)
        .context_type(ContextType::Query)
        .include_query_history(true)
        .max_query_history(2usize)
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let contents: Vec<&str> = blocks.iter().map(|b| b.content.as_str()).collect();

    assert_eq!(contents[0], QUERY_SYSTEM_PROMPT);
    assert_eq!(
        &contents[1..],
        &[
            "Content of 1",
            "Content of 2",
            "Question: Question 2?",
            "Answer 2",
            "Question: Question 3?",
            "Answer 3",
            "Question: Who is the stranger?",
        ]
    );
}

#[test]
fn test_character_context_block() {
    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(flat_story(1))
        .character_context("  Mara: a smuggler.  ")
        .model(caching_model())
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let context = &blocks[blocks.len() - 2];

    assert_eq!(context.role, Role::User);
    assert_eq!(context.content, "Active story context:\nMara: a smuggler.");
    assert!(context.is_cached());
}

#[test]
fn test_new_story_begins() {
    let voice = StoryVoiceBuilder::default()
        .paragraphs_per_turn(2u32)
        .build()
        .unwrap();
    let options = ContextOptions::builder()
        .input_text("A lighthouse keeper finds a letter.")
        .voice(voice)
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();

    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].content.contains("Create a story based on the user's direction. "));
    assert!(blocks[1].content.contains("approximately 2 paragraphs"));
    assert!(blocks[1].content.ends_with("Begin the story directly below (no labels or formatting):"));
}

#[test]
fn test_chapter_goal_and_viewpoint_in_system_prompt() {
    let mut current = chapter("c1", "Harbor", 1);
    current.goal = Some("Find the smuggler's ledger".to_string());

    let voice = StoryVoiceBuilder::default()
        .protagonist_name("Mara")
        .viewpoint_character_name("Ilse")
        .build()
        .unwrap();
    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(vec![beat_in("h1", "c1", 1)])
        .nodes(vec![current])
        .voice(voice)
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    let system = &blocks[0].content;

    assert!(system.contains("following Ilse's viewpoint"));
    assert!(system.contains("CHAPTER GOAL: Find the smuggler's ledger"));
}

#[test]
fn test_target_message_selects_current_container() {
    let nodes = vec![summarized("c1", "First", 1), summarized("c2", "Second", 2)];
    let messages = vec![
        beat_in("a1", "c1", 1),
        beat_in("a2", "c1", 2),
        beat_in("b1", "c2", 1),
    ];

    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(messages)
        .nodes(nodes)
        .target_message_id("a2")
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    assert_eq!(story_blocks(&blocks), vec!["Content of a1", "Content of a2"]);
}

#[test]
fn test_legacy_chapters() {
    let chapters = vec![
        Chapter {
            id: "late".to_string(),
            title: "Later".to_string(),
            summary: None,
            order: 2,
            include_in_full: Inclusion::Summary,
        },
        Chapter {
            id: "early".to_string(),
            title: "Earlier".to_string(),
            summary: Some("It started.".to_string()),
            order: 1,
            include_in_full: Inclusion::Summary,
        },
    ];
    let mut first = beat("e1", 1);
    first.chapter_id = Some("early".to_string());
    let mut second = beat("l1", 1);
    second.chapter_id = Some("late".to_string());

    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(vec![first, second])
        .chapters(chapters)
        .build()
        .unwrap();

    let blocks = ContextAssembler::default().assemble(&options).unwrap();
    assert_eq!(
        story_blocks(&blocks),
        vec!["[Chapter: Earlier]\nIt started.", "Content of l1"]
    );
}

#[test]
fn test_recording_sink_captures_request() {
    let sink = Arc::new(RecordingActivitySink::default());
    let assembler = ContextAssembler::new(ContextSettings::default()).with_activity_sink(sink.clone());

    let mut omitted = summarized("c1", "Dropped", 1);
    omitted.include_in_full = Inclusion::Omit;
    let options = ContextOptions::builder()
        .input_text("Next.")
        .messages(vec![beat_in("a1", "c1", 1), beat_in("b1", "c2", 1)])
        .nodes(vec![omitted, chapter("c2", "Kept", 2)])
        .build()
        .unwrap();

    let blocks = assembler.assemble(&options).unwrap();

    assert_eq!(sink.last_assembly(), Some(blocks));
    let events = sink.events();
    assert!(events.contains(&ActivityEvent::ContainerEmitted {
        title: "Dropped".to_string(),
        mode: ContainerMode::Skipped,
        blocks: 0,
    }));
    assert!(matches!(
        events.first(),
        Some(ActivityEvent::AssemblyStarted {
            context_type: ContextType::Story,
            message_count: 2,
            container_count: 2,
        })
    ));

    sink.clear();
    assert!(sink.events().is_empty());
}
