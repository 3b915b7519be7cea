//! Context assembly error types.

/// Specific error conditions raised while assembling generation context.
///
/// The two validation kinds are recoverable by the caller: write the
/// missing summaries (or pass `force_missing_summaries`), or split the
/// story into chapters, then retry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ContextErrorKind {
    /// Previous chapters with narrative content have no summary.
    #[display(
        "Cannot generate story continuation. The following previous chapters need summaries first: {}",
        _0.join(", ")
    )]
    MissingSummaries(Vec<String>),
    /// A story without chapters is too long for a model that renders it in full.
    #[display(
        "Story has {} messages without chapter organization. Please organize into chapters with summaries before continuing. (model '{}' renders the current chapter in full; limit is {} messages)",
        message_count,
        model,
        limit
    )]
    OversizedFlatStory {
        /// Number of narrative messages in the story
        message_count: usize,
        /// Largest flat story accepted for the model
        limit: usize,
        /// Model the context was assembled for
        model: String,
    },
    /// A message id was not present in the timeline.
    #[display("Target message not found: {}", _0)]
    TargetNotFound(String),
    /// Assembly options were incomplete or inconsistent.
    #[display("Invalid context options: {}", _0)]
    InvalidOptions(String),
}

impl ContextErrorKind {
    /// Whether the author can fix the story and retry the same call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingSummaries(_) | Self::OversizedFlatStory { .. }
        )
    }
}

/// Error type for context assembly.
///
/// # Examples
///
/// ```
/// use fabula_error::{ContextError, ContextErrorKind};
///
/// let err = ContextError::new(ContextErrorKind::MissingSummaries(vec![
///     "Arrival".to_string(),
///     "The Storm".to_string(),
/// ]));
/// assert!(format!("{}", err).contains("Arrival, The Storm"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Context Error: {} at line {} in {}", kind, line, file)]
pub struct ContextError {
    /// The specific error condition
    pub kind: ContextErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ContextError {
    /// Create a new ContextError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ContextErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// The author-facing message, without source location.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}
