//! Streaming generation on top of an assembled context.

use fabula_context::{ContextAssembler, ContextOptions};
use fabula_core::TokenUsage;
use fabula_error::{BackendError, FabulaResult};
use fabula_interface::{ChunkStream, GenerationBackend, GenerationRequest};
use futures_util::StreamExt;
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// What a generation stream produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Concatenated text of every chunk received
    pub text: String,
    /// Last usage reported by the backend
    pub usage: Option<TokenUsage>,
    /// Whether the stream was cut short by cancellation
    pub cancelled: bool,
}

/// Drains a chunk stream until it ends, reports `done`, or `cancel` resolves.
///
/// Cancellation is cooperative: text received before it is kept and
/// returned with `cancelled` set.
///
/// # Errors
///
/// Returns the first error yielded by the stream.
///
/// # Examples
///
/// ```
/// use fabula::{GenerationChunk, collect_generation};
/// use futures_util::stream;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let chunks = stream::iter(vec![
///     Ok(GenerationChunk::text("Once ")),
///     Ok(GenerationChunk::text("upon a time")),
///     Ok(GenerationChunk::finished(None)),
/// ]);
///
/// let outcome = collect_generation(Box::pin(chunks), std::future::pending()).await.unwrap();
/// assert_eq!(outcome.text, "Once upon a time");
/// assert!(!outcome.cancelled);
/// # }
/// ```
pub async fn collect_generation<C>(
    mut stream: ChunkStream,
    cancel: C,
) -> FabulaResult<GenerationOutcome>
where
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);
    let mut outcome = GenerationOutcome::default();

    loop {
        let next = tokio::select! {
            biased;
            () = &mut cancel => {
                info!(chars = outcome.text.len(), "Generation cancelled, keeping partial text");
                outcome.cancelled = true;
                return Ok(outcome);
            }
            next = stream.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                warn!(error = %e, chars = outcome.text.len(), "Generation stream failed");
                return Err(e);
            }
            None => break,
        };

        if let Some(text) = chunk.text {
            outcome.text.push_str(&text);
        }
        if chunk.usage.is_some() {
            outcome.usage = chunk.usage;
        }
        if chunk.done {
            break;
        }
    }

    debug!(chars = outcome.text.len(), "Generation finished");
    Ok(outcome)
}

/// Assembles context for `options` and streams a generation from `backend`.
///
/// Validation errors from assembly are returned before any backend call.
///
/// # Errors
///
/// Returns assembly, request or backend errors.
#[instrument(
    skip_all,
    fields(provider = backend.provider_name(), model = %options.model.id())
)]
pub async fn generate<C>(
    assembler: &ContextAssembler,
    backend: &dyn GenerationBackend,
    options: &ContextOptions,
    max_tokens: Option<u32>,
    cancel: C,
) -> FabulaResult<GenerationOutcome>
where
    C: Future<Output = ()>,
{
    let messages = assembler.generate_context_messages(options).await?;

    let request = GenerationRequest::builder()
        .model(options.model.id().clone())
        .messages(messages)
        .max_tokens(max_tokens)
        .build()
        .map_err(|e| BackendError::new(format!("Invalid generation request: {}", e)))?;

    let stream = backend.generate(&request).await?;
    collect_generation(stream, cancel).await
}
