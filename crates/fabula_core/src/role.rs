//! Role types for chat participants.

use serde::{Deserialize, Serialize};

/// Role of a chat block sent to a generation backend.
///
/// Serialized in lowercase, the shape providers expect.
///
/// # Examples
///
/// ```
/// use fabula_core::Role;
///
/// assert_ne!(Role::User, Role::Assistant);
/// assert_eq!(format!("{}", Role::System), "system");
/// assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the whole request
    #[display("system")]
    System,
    /// Author directions, questions and supporting context
    #[display("user")]
    User,
    /// Narrative history and prior answers
    #[default]
    #[display("assistant")]
    Assistant,
}
