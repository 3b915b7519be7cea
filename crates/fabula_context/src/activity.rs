//! Activity sinks for assembly events.

use fabula_core::ChatMessage;
use fabula_interface::{ActivityEvent, ActivitySink};
use std::sync::{Mutex, PoisonError};

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullActivitySink;

impl ActivitySink for NullActivitySink {
    fn record(&self, _event: &ActivityEvent) {}
}

/// Forwards events to `tracing` as structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivitySink;

impl ActivitySink for TracingActivitySink {
    fn record(&self, event: &ActivityEvent) {
        match event {
            ActivityEvent::AssemblyStarted {
                context_type,
                message_count,
                container_count,
            } => tracing::info!(
                %context_type,
                message_count,
                container_count,
                "Context assembly started"
            ),
            ActivityEvent::ActivePathResolved {
                active_messages,
                active_nodes,
            } => tracing::debug!(active_messages, active_nodes, "Active path resolved"),
            ActivityEvent::ContainerEmitted {
                title,
                mode,
                blocks,
            } => tracing::debug!(title = %title, %mode, blocks, "Container emitted"),
            ActivityEvent::SmartContextUnavailable { reason } => {
                tracing::warn!(reason = %reason, "Smart context unavailable")
            }
            ActivityEvent::AssemblyCompleted {
                messages,
                total_chars,
            } => tracing::info!(
                blocks = messages.len(),
                total_chars,
                cached = messages.iter().filter(|m| m.is_cached()).count(),
                "Context assembly completed"
            ),
        }
    }
}

/// Keeps every event in memory.
///
/// Lets a UI show exactly what was sent with the last request, and lets
/// tests assert on assembly decisions.
///
/// # Examples
///
/// ```
/// use fabula_context::RecordingActivitySink;
/// use fabula_interface::{ActivityEvent, ActivitySink};
///
/// let sink = RecordingActivitySink::default();
/// sink.record(&ActivityEvent::SmartContextUnavailable { reason: "timeout".to_string() });
/// assert_eq!(sink.events().len(), 1);
/// assert!(sink.last_assembly().is_none());
/// ```
#[derive(Debug, Default)]
pub struct RecordingActivitySink {
    events: Mutex<Vec<ActivityEvent>>,
}

impl RecordingActivitySink {
    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Blocks of the most recently completed assembly.
    pub fn last_assembly(&self) -> Option<Vec<ChatMessage>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find_map(|event| match event {
                ActivityEvent::AssemblyCompleted { messages, .. } => Some(messages.clone()),
                _ => None,
            })
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ActivitySink for RecordingActivitySink {
    fn record(&self, event: &ActivityEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
