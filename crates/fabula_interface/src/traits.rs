//! Trait definitions for generation backends, analyzers and activity sinks.

use crate::{ActivityEvent, GenerationChunk, GenerationRequest, SmartContextRequest};
use async_trait::async_trait;
use fabula_core::Message;
use fabula_error::FabulaResult;
use futures_util::stream::Stream;
use std::pin::Pin;

/// Stream of generation chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = FabulaResult<GenerationChunk>> + Send>>;

/// A provider client that turns an assembled context into streamed text.
///
/// Dropping the returned stream cancels the call. Text already yielded
/// stays with the caller; backends never retract delivered chunks.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start a generation and return its chunk stream.
    async fn generate(&self, req: &GenerationRequest) -> FabulaResult<ChunkStream>;

    /// Provider name (e.g., "anthropic", "openrouter", "ollama").
    fn provider_name(&self) -> &'static str;
}

/// Heuristic selector of the messages most relevant to the next turn.
///
/// Used by smart-story contexts. Any error, timeout or empty answer makes
/// the assembler fall back to the deterministic tiered path.
#[async_trait]
pub trait SceneRelevanceAnalyzer: Send + Sync {
    /// Select the messages to send, in the order they should appear.
    async fn analyze(&self, request: SmartContextRequest<'_>) -> FabulaResult<Vec<Message>>;
}

/// Receiver of structured assembly events.
///
/// Replaces process-wide "last request" captures: whoever wants to
/// inspect what was sent injects a sink.
pub trait ActivitySink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &ActivityEvent);
}
