//! Core data types for the Fabula story context engine.
//!
//! This crate provides the read-only story records (messages, nodes,
//! legacy chapters) consumed by the context engine, and the role-tagged
//! chat blocks it produces.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod character;
mod chat;
mod container;
mod message;
mod node;
mod role;
mod usage;

pub use character::{Character, ContextItem};
pub use chat::{CacheControl, CacheKind, CacheTtl, ChatMessage};
pub use container::{Container, ContainerSource};
pub use message::{BranchChoices, BranchOption, Message, MessageBuilder, MessageKind};
pub use node::{Chapter, Inclusion, Node, NodeBuilder, NodeKind};
pub use role::Role;
pub use usage::TokenUsage;
