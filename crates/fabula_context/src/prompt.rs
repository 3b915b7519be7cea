//! System prompts, directives and Q&A history blocks.

use crate::StorySetting;
use fabula_core::{ChatMessage, Message, Role};
use serde::{Deserialize, Serialize};

/// Persona used for query contexts.
pub const QUERY_SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about a story in progress. Provide clear, concise answers about the story, its characters, plot, or any other aspect the user is asking about. Do not continue the story itself.";

const STYLE_RULES: &str = r#"Write in a natural, flowing style that draws the reader in. Focus on "show, don't tell" and include vivid descriptions, dialogue, and character thoughts where appropriate.

IMPORTANT:
- Write ONLY a single story continuation turn
- Write ONLY what the user's direction specifically asks for - do not add extra scenes, events, or content beyond what was requested
- If the user asks for a conversation, write only that conversation - do not add events before or after
- If the user asks for a specific action or scene, write only that action or scene - do not extend beyond it
- Use natural paragraph breaks to structure your writing
- Do not include chapter headers, separators, or section labels
- Do not add author notes or commentary
- Simply continue the story directly with proper paragraphs
- If you need to reason about the story, use <think>your reasoning here</think> tags
- Do NOT use any other tags (no </s>, <|im_end|>, etc.) - only <think> tags when needed

PACING AND TONE GUIDELINES:
- Not every turn needs to end with a cliffhanger or dramatic revelation
- ABSOLUTELY NEVER use repetitive reflective endings. FORBIDDEN phrases include: "their life would never be the same", "everything had changed", "nothing would ever be the same", "the world had shifted", "everything was different now", "life as they knew it was over", "a new chapter had begun", "the old world was gone", "everything was forever altered", or ANY similar clichéd reflective conclusion. These are BANNED.
- Allow for natural story rhythms with quieter moments, conversations, and character development
- Sometimes the most engaging turns simply advance the story naturally without forced drama
- Focus on authentic character actions and dialogue rather than overly dramatic internal monologues"#;

/// Grammatical person of the narration.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Person {
    /// "I walked"
    #[display("first person")]
    First,
    /// "She walked"
    #[default]
    #[display("third person")]
    Third,
}

/// Grammatical tense of the narration.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tense {
    /// "walks"
    #[display("present tense")]
    Present,
    /// "walked"
    #[default]
    #[display("past tense")]
    Past,
}

/// Narrative voice parameters for story contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(default, setter(into))]
pub struct StoryVoice {
    /// Stored value of the story's genre
    #[builder(setter(into, strip_option))]
    pub story_setting: Option<String>,
    /// Narrative person
    pub person: Person,
    /// Narrative tense
    pub tense: Tense,
    /// Protagonist, used when the chapter has no viewpoint character
    #[builder(setter(into, strip_option))]
    pub protagonist_name: Option<String>,
    /// Viewpoint character of the current chapter
    #[builder(setter(into, strip_option))]
    pub viewpoint_character_name: Option<String>,
    /// Requested length of each turn
    #[builder(setter(into, strip_option))]
    pub paragraphs_per_turn: Option<u32>,
}

impl StoryVoice {
    /// The name whose viewpoint the narration follows.
    pub fn viewpoint_name(&self) -> Option<&str> {
        self.viewpoint_character_name
            .as_deref()
            .or(self.protagonist_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }
}

/// The system prompt for story and smart-story contexts.
pub fn story_system_prompt(
    voice: &StoryVoice,
    settings: &[StorySetting],
    is_new_story: bool,
    chapter_goal: Option<&str>,
) -> String {
    let setting_text = voice
        .story_setting
        .as_deref()
        .and_then(|value| settings.iter().find(|s| s.value == value))
        .map(|setting| {
            format!(
                "This is a {} story. Write in the appropriate tone, style, and atmosphere for this genre. ",
                setting.label.to_lowercase()
            )
        })
        .unwrap_or_default();

    let perspective_text = match (voice.viewpoint_name(), voice.person) {
        (Some(name), Person::First) => format!(" from the perspective of {}", name),
        (Some(name), Person::Third) => format!(" following {}'s viewpoint", name),
        (None, _) => String::new(),
    };

    let style_text = format!(
        "Write in {} {}{}. ",
        voice.person, voice.tense, perspective_text
    );

    let task_text = if is_new_story {
        "Create a story based on the user's direction. "
    } else {
        "Continue the story based on the user's direction, maintaining consistency with previous events and character development. "
    };

    let goal_text = chapter_goal
        .map(|goal| {
            format!(
                "\n\nCHAPTER GOAL: {}\nKeep this goal in mind as you continue the story, but don't feel obligated to fully accomplish it in a single turn. Progress naturally toward this goal through character actions and developments. ",
                goal
            )
        })
        .unwrap_or_default();

    format!(
        "You are a creative story writer helping to create an engaging narrative. {}{}{}{}{}",
        setting_text, style_text, task_text, goal_text, STYLE_RULES
    )
}

/// The closing user block of a story context.
///
/// Frames `input` as an instruction rather than story text.
///
/// # Examples
///
/// ```
/// use fabula_context::story_directive;
///
/// let text = story_directive("They reach the gate.", Some(1), false);
/// assert!(text.contains("\"They reach the gate.\""));
/// assert!(text.contains("approximately 1 paragraph in"));
/// assert!(text.ends_with("Continue the story directly below (no labels or formatting):"));
/// ```
pub fn story_directive(input: &str, paragraphs_per_turn: Option<u32>, is_new_story: bool) -> String {
    let guidance = match paragraphs_per_turn {
        Some(n) if n > 0 => format!(
            "\n\nIMPORTANT: Write approximately {} paragraph{} in your response.",
            n,
            if n == 1 { "" } else { "s" }
        ),
        _ => String::new(),
    };
    let verb = if is_new_story { "Begin" } else { "Continue" };

    format!(
        "The following is an instruction describing what to write next. It is NOT part of the story - write the content it describes:\n\n\"{}\"{}\n\n{} the story directly below (no labels or formatting):",
        input, guidance, verb
    )
}

/// The closing user block of a query context.
pub fn query_directive(input: &str) -> String {
    format!("Question: {}", input)
}

/// Prior Q&A turns, most recent `max` only, as alternating user/assistant blocks.
///
/// Queries without a recorded question contribute only their answer.
pub fn query_history_blocks(messages: &[Message], max: usize) -> Vec<ChatMessage> {
    let queries: Vec<&Message> = messages
        .iter()
        .filter(|m| m.is_query && m.role == Role::Assistant)
        .collect();
    let skip = queries.len().saturating_sub(max);

    let mut blocks = Vec::new();
    for query in &queries[skip..] {
        if let Some(question) = query.instruction.as_deref().filter(|q| !q.is_empty()) {
            blocks.push(ChatMessage::user(query_directive(question)));
        }
        if !query.content.is_empty() {
            blocks.push(ChatMessage::assistant(query.content.clone()));
        }
    }
    blocks
}
