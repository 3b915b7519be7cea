//! Error types for the Fabula story context engine.
//!
//! This crate provides the foundation error types used throughout the Fabula workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use fabula_error::{ContextError, ContextErrorKind, FabulaResult};
//!
//! fn assemble() -> FabulaResult<()> {
//!     Err(ContextError::new(ContextErrorKind::MissingSummaries(vec![
//!         "The Road".to_string(),
//!     ])))?
//! }
//!
//! let err = assemble().unwrap_err();
//! assert!(err.is_recoverable_by_caller());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analysis;
mod backend;
mod config;
mod context;
mod error;
mod json;

pub use analysis::{AnalysisError, AnalysisErrorKind};
pub use backend::BackendError;
pub use config::ConfigError;
pub use context::{ContextError, ContextErrorKind};
pub use error::{FabulaError, FabulaErrorKind, FabulaResult};
pub use json::JsonError;
