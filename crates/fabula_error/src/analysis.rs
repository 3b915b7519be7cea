//! Scene-relevance analysis error types.

/// Ways the smart-context analyzer can fail to produce a selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum AnalysisErrorKind {
    /// The analyzer reported a failure
    #[display("Analysis failed: {}", _0)]
    Failed(String),
    /// The analyzer did not answer in time
    #[display("Analysis timed out after {}ms", _0)]
    Timeout(u64),
    /// The analyzer answered with no usable messages
    #[display("Analysis selected no messages")]
    Empty,
}

/// Scene-relevance analysis error with location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{AnalysisError, AnalysisErrorKind};
///
/// let err = AnalysisError::new(AnalysisErrorKind::Timeout(30_000));
/// assert!(format!("{}", err).contains("30000ms"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Analysis Error: {} at line {} in {}", kind, line, file)]
pub struct AnalysisError {
    /// The kind of error that occurred
    pub kind: AnalysisErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl AnalysisError {
    /// Create a new analysis error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: AnalysisErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
