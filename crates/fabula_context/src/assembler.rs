//! The context assembler.
//!
//! Turns "story so far" into the bounded, ordered list of role-tagged blocks
//! sent with a generation call:
//!
//! 1. system prompt (query persona, or the story voice prompt)
//! 2. story content: analyzer-selected messages for smart-story contexts,
//!    otherwise previous containers (skipped, summarized or in full) followed
//!    by the current container through the tier selector
//! 3. character context
//! 4. Q&A history (query contexts)
//! 5. the closing directive
//!
//! Validation failures name every offending container in one error.

use crate::tree::node_rank;
use crate::{
    ActivePath, ContextOptions, ContextSettings, FabulaConfig, Fidelity, ModelProfile,
    NullActivitySink, StorySetting, chapters_in_story_order, message_container_map,
    nodes_in_story_order, prompt, resolve_active_path, tier_messages,
};
use fabula_core::{CacheTtl, ChatMessage, Container, ContainerSource, Inclusion, Message};
use fabula_error::{
    AnalysisError, AnalysisErrorKind, ContextError, ContextErrorKind, FabulaResult,
};
use fabula_interface::{
    ActivityEvent, ActivitySink, ContainerMode, ContextType, SceneRelevanceAnalyzer,
    SmartContextRequest,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Assembles generation context from a story.
///
/// Holds no per-call state: equivalent options always produce equivalent
/// output, so concurrent calls need no coordination and a retried call
/// reproduces the same context.
///
/// # Examples
///
/// ```
/// use fabula_context::{ContextAssembler, ContextOptions, ContextSettings};
/// use fabula_core::{Message, Role};
///
/// let assembler = ContextAssembler::new(ContextSettings::default());
/// let options = ContextOptions::builder()
///     .input_text("A stranger knocks.")
///     .messages(vec![Message::narrative("m1", 1, "The inn was quiet.")])
///     .build()
///     .unwrap();
///
/// let blocks = assembler.assemble(&options).unwrap();
/// assert_eq!(blocks[0].role, Role::System);
/// assert_eq!(blocks[1].content, "The inn was quiet.");
/// assert_eq!(blocks.last().unwrap().role, Role::User);
/// ```
pub struct ContextAssembler {
    settings: ContextSettings,
    story_settings: Vec<StorySetting>,
    analyzer: Option<Arc<dyn SceneRelevanceAnalyzer>>,
    sink: Arc<dyn ActivitySink>,
}

impl std::fmt::Debug for ContextAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextAssembler")
            .field("settings", &self.settings)
            .field("story_settings", &self.story_settings.len())
            .field("analyzer", &self.analyzer.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(ContextSettings::default())
    }
}

impl ContextAssembler {
    /// Creates an assembler with the given thresholds, no analyzer and a
    /// discarding activity sink.
    pub fn new(settings: ContextSettings) -> Self {
        Self {
            settings,
            story_settings: Vec::new(),
            analyzer: None,
            sink: Arc::new(NullActivitySink),
        }
    }

    /// Creates an assembler from loaded configuration.
    pub fn from_config(config: &FabulaConfig) -> Self {
        Self::new(config.context.clone()).with_story_settings(config.story_settings.clone())
    }

    /// Genres available to the story system prompt.
    pub fn with_story_settings(mut self, story_settings: Vec<StorySetting>) -> Self {
        self.story_settings = story_settings;
        self
    }

    /// Analyzer used by smart-story contexts.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn SceneRelevanceAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Receiver of assembly events.
    pub fn with_activity_sink(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Thresholds in use.
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Builds the message list for one generation call.
    ///
    /// For smart-story contexts the scene-relevance analyzer is consulted
    /// first, bounded by `smart_context_timeout_ms`. Its failure, timeout or
    /// empty answer is logged and the deterministic path is used instead.
    ///
    /// # Errors
    ///
    /// - [`ContextErrorKind::MissingSummaries`] when earlier containers with
    ///   narrative content have no summary and `force_missing_summaries` is
    ///   not set. Every offending title is listed.
    /// - [`ContextErrorKind::OversizedFlatStory`] when a story without
    ///   containers exceeds `flat_story_limit` for a model that renders the
    ///   current container in full.
    #[instrument(
        skip_all,
        fields(
            context_type = %options.context_type,
            model = %options.model.id(),
            messages = options.messages.len(),
        )
    )]
    pub async fn generate_context_messages(
        &self,
        options: &ContextOptions,
    ) -> FabulaResult<Vec<ChatMessage>> {
        let view = self.view(options);

        let smart_blocks = if options.context_type == ContextType::SmartStory {
            match self.smart_context(options, &view).await {
                Ok(blocks) => Some(blocks),
                Err(err) => {
                    warn!(error = %err, "Smart context failed, using tiered context");
                    self.sink.record(&ActivityEvent::SmartContextUnavailable {
                        reason: err.kind.to_string(),
                    });
                    None
                }
            }
        } else {
            None
        };

        self.finish(options, &view, smart_blocks)
    }

    /// Builds the message list without consulting the analyzer.
    ///
    /// Smart-story contexts are assembled like story contexts.
    ///
    /// # Errors
    ///
    /// Same validation errors as [`generate_context_messages`](Self::generate_context_messages).
    #[instrument(
        skip_all,
        fields(
            context_type = %options.context_type,
            model = %options.model.id(),
            messages = options.messages.len(),
        )
    )]
    pub fn assemble(&self, options: &ContextOptions) -> FabulaResult<Vec<ChatMessage>> {
        let view = self.view(options);
        self.finish(options, &view, None)
    }

    fn view<'a>(&self, options: &'a ContextOptions) -> StoryView<'a> {
        let view = StoryView::new(options);

        self.sink.record(&ActivityEvent::AssemblyStarted {
            context_type: options.context_type,
            message_count: options.messages.len(),
            container_count: view.containers.len(),
        });
        if let Some(path) = &view.active {
            self.sink.record(&ActivityEvent::ActivePathResolved {
                active_messages: path.active_message_ids.len(),
                active_nodes: path.active_node_ids.len(),
            });
        }

        view
    }

    fn finish(
        &self,
        options: &ContextOptions,
        view: &StoryView<'_>,
        smart_blocks: Option<Vec<ChatMessage>>,
    ) -> FabulaResult<Vec<ChatMessage>> {
        let mut blocks = vec![self.system_block(options, view)];

        match smart_blocks {
            Some(selected) => {
                debug!(selected = selected.len(), "Using smart context selection");
                blocks.extend(selected);
            }
            None => self.push_story(options, view, &mut blocks)?,
        }

        let character_context = options
            .character_context
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());
        if let Some(text) = character_context {
            let mut block = ChatMessage::user(format!("Active story context:\n{}", text));
            if options.model.caches_prompts() {
                block = block.cached(*self.settings.cache_ttl());
            }
            blocks.push(block);
        }

        if options.context_type == ContextType::Query && options.include_query_history {
            let max = options
                .max_query_history
                .unwrap_or(*self.settings.max_query_history());
            blocks.extend(prompt::query_history_blocks(&options.messages, max));
        }

        let directive = match options.context_type {
            ContextType::Query => prompt::query_directive(&options.input_text),
            ContextType::Story | ContextType::SmartStory => prompt::story_directive(
                &options.input_text,
                options.voice.paragraphs_per_turn,
                view.spine.is_empty(),
            ),
        };
        blocks.push(ChatMessage::user(directive));

        let total_chars = blocks.iter().map(|b| b.content.chars().count()).sum();
        debug!(blocks = blocks.len(), total_chars, "Assembled context");
        self.sink.record(&ActivityEvent::AssemblyCompleted {
            messages: blocks.clone(),
            total_chars,
        });

        Ok(blocks)
    }

    fn system_block(&self, options: &ContextOptions, view: &StoryView<'_>) -> ChatMessage {
        match options.context_type {
            ContextType::Query => ChatMessage::system(prompt::QUERY_SYSTEM_PROMPT),
            ContextType::Story | ContextType::SmartStory => {
                let goal = view.current_container().and_then(|c| c.goal.as_deref());
                ChatMessage::system(prompt::story_system_prompt(
                    &options.voice,
                    &self.story_settings,
                    view.spine.is_empty(),
                    goal,
                ))
            }
        }
    }

    async fn smart_context(
        &self,
        options: &ContextOptions,
        view: &StoryView<'_>,
    ) -> Result<Vec<ChatMessage>, AnalysisError> {
        let Some(analyzer) = &self.analyzer else {
            return Err(AnalysisError::new(AnalysisErrorKind::Failed(
                "no scene-relevance analyzer configured".to_string(),
            )));
        };

        let candidates: Cow<'_, [Message]> = match &view.active {
            Some(path) => Cow::Owned(
                options
                    .messages
                    .iter()
                    .filter(|m| path.contains_message(&m.id))
                    .cloned()
                    .collect(),
            ),
            None => Cow::Borrowed(&options.messages),
        };

        let request = SmartContextRequest {
            input_text: &options.input_text,
            messages: &*candidates,
            characters: &options.characters,
            context_items: &options.context_items,
            containers: &view.containers,
            target_message_id: options.target_message_id.as_deref(),
            force_missing_summaries: options.force_missing_summaries,
        };

        let timeout_ms = *self.settings.smart_context_timeout_ms();
        let selected =
            match tokio::time::timeout(Duration::from_millis(timeout_ms), analyzer.analyze(request))
                .await
            {
                Ok(Ok(selected)) => selected,
                Ok(Err(err)) => {
                    return Err(AnalysisError::new(AnalysisErrorKind::Failed(
                        err.to_string(),
                    )));
                }
                Err(_) => return Err(AnalysisError::new(AnalysisErrorKind::Timeout(timeout_ms))),
            };

        let blocks: Vec<ChatMessage> = selected
            .iter()
            .filter(|m| view.is_active(&m.id))
            .filter(|m| m.has_content())
            .map(|m| ChatMessage::assistant(m.content.clone()))
            .collect();

        if blocks.is_empty() {
            return Err(AnalysisError::new(AnalysisErrorKind::Empty));
        }
        Ok(blocks)
    }

    fn push_story(
        &self,
        options: &ContextOptions,
        view: &StoryView<'_>,
        blocks: &mut Vec<ChatMessage>,
    ) -> FabulaResult<()> {
        self.validate_story(options, view)?;

        let story = render_story(view, &options.model, &self.settings);
        for container in &story.containers {
            debug!(title = %container.title, mode = %container.mode, blocks = container.blocks, "Container emitted");
            self.sink.record(&ActivityEvent::ContainerEmitted {
                title: container.title.clone(),
                mode: container.mode,
                blocks: container.blocks,
            });
        }
        if view.current.is_none() {
            debug!(emitted = story.blocks.len(), "Flat story");
        }

        let ttl = *self.settings.cache_ttl();
        blocks.extend(story.blocks.into_iter().map(|block| block.into_chat(ttl)));
        Ok(())
    }

    /// Refuses stories that cannot be continued faithfully.
    fn validate_story(&self, options: &ContextOptions, view: &StoryView<'_>) -> FabulaResult<()> {
        let Some(current) = view.current else {
            let limit = *self.settings.flat_story_limit();
            let count = view.spine.len();

            if count > limit && !options.force_missing_summaries {
                if options.model.current_container_always_full() {
                    error!(count, limit, "Flat story too large for model");
                    return Err(ContextError::new(ContextErrorKind::OversizedFlatStory {
                        message_count: count,
                        limit,
                        model: options.model.id().clone(),
                    })
                    .into());
                }
                warn!(count, limit, "Story has no chapter organization");
            }
            return Ok(());
        };

        let missing: Vec<String> = view
            .previous_containers(current)
            .into_iter()
            .filter(|c| c.inclusion == Inclusion::Summary && c.written_summary().is_none())
            .filter(|c| view.messages_in(&c.id).iter().any(|m| m.has_content()))
            .map(|c| c.title.clone())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        if options.force_missing_summaries {
            warn!(?missing, "Proceeding without chapter summaries");
            return Ok(());
        }
        error!(?missing, "Previous chapters are missing summaries");
        Err(ContextError::new(ContextErrorKind::MissingSummaries(missing)).into())
    }
}

/// A story block before it becomes a chat message.
pub(crate) struct StoryBlock<'a> {
    pub(crate) content: String,
    /// Messages the block stands for
    pub(crate) message_ids: Vec<&'a str>,
    /// Fidelity, for blocks rendered from a single message
    pub(crate) fidelity: Option<Fidelity>,
    pub(crate) cached: bool,
}

impl StoryBlock<'_> {
    fn into_chat(self, ttl: CacheTtl) -> ChatMessage {
        let block = ChatMessage::assistant(self.content);
        if self.cached { block.cached(ttl) } else { block }
    }
}

/// How one container was represented.
pub(crate) struct EmittedContainer {
    pub(crate) title: String,
    pub(crate) mode: ContainerMode,
    pub(crate) blocks: usize,
}

/// The story part of a context: every block between the system prompt and
/// the character context.
#[derive(Default)]
pub(crate) struct RenderedStory<'a> {
    pub(crate) blocks: Vec<StoryBlock<'a>>,
    pub(crate) containers: Vec<EmittedContainer>,
}

impl<'a> RenderedStory<'a> {
    fn push_previous(&mut self, container: &Container, view: &StoryView<'a>) {
        let start = self.blocks.len();
        let messages = view.messages_in(&container.id);
        let summary_block = || {
            container.written_summary().map(|summary| StoryBlock {
                content: format!("[Chapter: {}]\n{}", container.title, summary),
                message_ids: messages.iter().map(|m| m.id.as_str()).collect(),
                fidelity: None,
                cached: false,
            })
        };

        let mode = match container.inclusion {
            Inclusion::Omit => ContainerMode::Skipped,
            Inclusion::Full => {
                let with_content: Vec<&Message> =
                    messages.iter().copied().filter(|m| m.has_content()).collect();

                if !with_content.is_empty() {
                    self.blocks.push(StoryBlock {
                        content: format!("[Chapter: {}]", container.title),
                        message_ids: Vec::new(),
                        fidelity: None,
                        cached: false,
                    });
                    self.blocks.extend(with_content.into_iter().map(|m| StoryBlock {
                        content: m.content.clone(),
                        message_ids: vec![m.id.as_str()],
                        fidelity: Some(Fidelity::Full),
                        cached: false,
                    }));
                    ContainerMode::Full
                } else if let Some(block) = summary_block() {
                    self.blocks.push(block);
                    ContainerMode::Summary
                } else {
                    ContainerMode::Skipped
                }
            }
            Inclusion::Summary => match summary_block() {
                Some(block) => {
                    self.blocks.push(block);
                    ContainerMode::Summary
                }
                None => ContainerMode::Skipped,
            },
        };

        self.containers.push(EmittedContainer {
            title: container.title.clone(),
            mode,
            blocks: self.blocks.len() - start,
        });
    }

    /// Pushes the messages of the current scope through the tier selector,
    /// attaching cache hints to the trailing blocks. Returns the number of
    /// blocks pushed.
    fn push_tiered(
        &mut self,
        messages: &[&'a Message],
        model: &ModelProfile,
        settings: &ContextSettings,
    ) -> usize {
        let rendered: Vec<_> = tier_messages(
            messages,
            model.current_container_always_full(),
            true,
            settings,
        )
        .into_iter()
        .filter(|tiered| !tiered.content.trim().is_empty())
        .collect();

        let cache_from = if model.caches_prompts() {
            rendered.len().saturating_sub(*settings.cached_tail())
        } else {
            rendered.len()
        };

        let count = rendered.len();
        self.blocks
            .extend(rendered.into_iter().enumerate().map(|(index, tiered)| StoryBlock {
                content: tiered.content.to_string(),
                message_ids: vec![tiered.message.id.as_str()],
                fidelity: Some(tiered.fidelity),
                cached: index >= cache_from,
            }));
        count
    }
}

/// Renders the story blocks for `view` without validating it.
///
/// Containers are rendered when a current container resolves: active
/// previous containers first (skipped, summarized or in full), then the
/// current container through the tier selector. Otherwise the whole spine
/// is tiered as one flat scope.
pub(crate) fn render_story<'a>(
    view: &StoryView<'a>,
    model: &ModelProfile,
    settings: &ContextSettings,
) -> RenderedStory<'a> {
    let mut story = RenderedStory::default();

    let Some(current) = view.current else {
        story.push_tiered(&view.spine, model, settings);
        return story;
    };

    for container in view.previous_containers(current) {
        story.push_previous(container, view);
    }

    let container = &view.containers[current];
    let blocks = story.push_tiered(&view.messages_in(&container.id), model, settings);
    story.containers.push(EmittedContainer {
        title: container.title.clone(),
        mode: ContainerMode::Current,
        blocks,
    });

    story
}

/// The story as seen by one assembly call.
pub(crate) struct StoryView<'a> {
    active: Option<ActivePath>,
    /// Narrative messages on the active path, in storage order
    spine: Vec<&'a Message>,
    /// Containers in story order
    containers: Vec<Container>,
    /// Spine messages grouped by container id, in story order
    by_container: HashMap<String, Vec<&'a Message>>,
    /// Index of the current container
    current: Option<usize>,
}

impl<'a> StoryView<'a> {
    pub(crate) fn new(options: &'a ContextOptions) -> Self {
        let messages = &options.messages;
        let nodes = &options.nodes;

        let active = (!options.branch_choices.is_empty() && !nodes.is_empty())
            .then(|| resolve_active_path(messages, nodes, &options.branch_choices));

        let spine: Vec<&Message> = messages
            .iter()
            .filter(|m| m.is_narrative())
            .filter(|m| active.as_ref().is_none_or(|path| path.contains_message(&m.id)))
            .collect();

        let (containers, container_of) = if !nodes.is_empty() {
            let containers: Vec<Container> = chapters_in_story_order(nodes)
                .into_iter()
                .map(Container::from)
                .collect();
            (containers, message_container_map(messages, nodes))
        } else if !options.chapters.is_empty() {
            let mut chapters: Vec<_> = options.chapters.iter().collect();
            chapters.sort_by_key(|c| c.order);
            let containers: Vec<Container> = chapters.into_iter().map(Container::from).collect();
            let container_of: HashMap<String, String> = messages
                .iter()
                .filter_map(|m| {
                    let chapter_id = Container::owner_id(ContainerSource::LegacyChapter, m)?;
                    containers
                        .iter()
                        .any(|c| c.id == chapter_id)
                        .then(|| (m.id.clone(), chapter_id.to_string()))
                })
                .collect();
            (containers, container_of)
        } else {
            (Vec::new(), HashMap::new())
        };

        let mut by_container: HashMap<String, Vec<&Message>> = HashMap::new();
        for message in &spine {
            if let Some(container_id) = container_of.get(&message.id) {
                by_container
                    .entry(container_id.clone())
                    .or_default()
                    .push(*message);
            }
        }

        if !nodes.is_empty() {
            let rank: HashMap<&str, usize> = nodes_in_story_order(nodes)
                .into_iter()
                .enumerate()
                .map(|(index, node)| (node.id.as_str(), index))
                .collect();
            for group in by_container.values_mut() {
                group.sort_by_key(|m| (node_rank(&rank, m), m.order));
            }
        }

        let target_container = options
            .target_message_id
            .as_deref()
            .and_then(|id| container_of.get(id));
        let last_container = spine.iter().rev().find_map(|m| container_of.get(&m.id));
        let current = target_container
            .or(last_container)
            .and_then(|id| containers.iter().position(|c| &c.id == id));

        if current.is_none() && !containers.is_empty() {
            debug!("No current container resolved, treating story as flat");
        }

        Self {
            active,
            spine,
            containers,
            by_container,
            current,
        }
    }

    /// Narrative messages on the active path.
    pub(crate) fn spine(&self) -> &[&'a Message] {
        &self.spine
    }

    /// Containers before `current` that are on the active path.
    fn previous_containers(&self, current: usize) -> Vec<&Container> {
        self.containers[..current]
            .iter()
            .filter(|c| self.is_active_container(c))
            .collect()
    }

    fn current_container(&self) -> Option<&Container> {
        self.current.map(|index| &self.containers[index])
    }

    fn messages_in(&self, container_id: &str) -> Vec<&'a Message> {
        self.by_container
            .get(container_id)
            .cloned()
            .unwrap_or_default()
    }

    fn is_active(&self, message_id: &str) -> bool {
        self.active
            .as_ref()
            .is_none_or(|path| path.contains_message(message_id))
    }

    fn is_active_container(&self, container: &Container) -> bool {
        match (&self.active, container.source) {
            (Some(path), ContainerSource::Node) => path.contains_node(&container.id),
            _ => true,
        }
    }
}
