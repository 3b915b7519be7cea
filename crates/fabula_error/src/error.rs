//! Top-level error wrapper types.

use crate::{AnalysisError, BackendError, ConfigError, ContextError, JsonError};

/// Every error condition the Fabula crates can report.
///
/// # Examples
///
/// ```
/// use fabula_error::{FabulaError, ConfigError};
///
/// let err: FabulaError = ConfigError::new("bad threshold").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum FabulaErrorKind {
    /// Context assembly error
    #[from(ContextError)]
    Context(ContextError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Generation backend error
    #[from(BackendError)]
    Backend(BackendError),
    /// Scene-relevance analysis error
    #[from(AnalysisError)]
    Analysis(AnalysisError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Fabula error with kind discrimination.
///
/// # Examples
///
/// ```
/// use fabula_error::{FabulaResult, BackendError};
///
/// fn might_fail() -> FabulaResult<()> {
///     Err(BackendError::new("connection reset"))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(!err.is_recoverable_by_caller());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Fabula Error: {}", _0)]
pub struct FabulaError(Box<FabulaErrorKind>);

impl FabulaError {
    /// Create a new error from a kind.
    pub fn new(kind: FabulaErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FabulaErrorKind {
        &self.0
    }

    /// The context error, if this is one.
    pub fn as_context(&self) -> Option<&ContextError> {
        match self.kind() {
            FabulaErrorKind::Context(err) => Some(err),
            _ => None,
        }
    }

    /// True for validation failures the author resolves before retrying.
    pub fn is_recoverable_by_caller(&self) -> bool {
        self.as_context()
            .is_some_and(|err| err.kind.is_validation())
    }
}

// Generic From implementation for any type that converts to FabulaErrorKind
impl<T> From<T> for FabulaError
where
    T: Into<FabulaErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Fabula operations.
pub type FabulaResult<T> = std::result::Result<T, FabulaError>;
