//! Event emitter trait for session notifications.
//!
//! Implementations handle transport details (channels, UI bridges, etc.).

use tokio::sync::mpsc;

use crate::events::SessionEvent;

/// Trait for emitting session events.
///
/// `emit` must not block; the session calls it from inside its poll loop.
pub trait SessionEventEmitter: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// A no-op event emitter for tests and headless contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    /// Create a new no-op emitter.
    pub const fn new() -> Self {
        Self
    }
}

impl SessionEventEmitter for NoopEmitter {
    fn emit(&self, _event: SessionEvent) {
        // Intentionally do nothing
    }
}

/// Emitter that forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver the host reads from.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionEventEmitter for ChannelEmitter {
    fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Session event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn SessionEventEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(SessionEvent::Thinking(true));
    }

    #[test]
    fn test_channel_emitter_delivers_in_order() {
        let (emitter, mut rx) = ChannelEmitter::new();
        emitter.emit(SessionEvent::Thinking(true));
        emitter.emit(SessionEvent::TranscriptChanged { len: 1 });

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Thinking(true));
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::TranscriptChanged { len: 1 }
        );
    }

    #[test]
    fn test_channel_emitter_survives_dropped_receiver() {
        let (emitter, rx) = ChannelEmitter::new();
        drop(rx);
        emitter.emit(SessionEvent::Thinking(false));
    }
}
