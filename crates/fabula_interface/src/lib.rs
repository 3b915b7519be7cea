//! Trait definitions for the collaborators of the Fabula context engine.
//!
//! The engine itself is a pure projection. Everything with I/O sits
//! behind one of these traits: the generation backend that consumes an
//! assembled context, the optional scene-relevance analyzer used by
//! smart-story contexts, and the activity sink that receives structured
//! assembly events.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;
mod types;

pub use traits::{ActivitySink, ChunkStream, GenerationBackend, SceneRelevanceAnalyzer};
pub use types::{
    ActivityEvent, ContainerMode, ContextType, GenerationChunk, GenerationRequest,
    GenerationRequestBuilder, SmartContextRequest,
};
