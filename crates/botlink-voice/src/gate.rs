//! Echo gate: keeps the microphone away from the bot's own voice.
//!
//! The speech coordinator raises the gate for the whole duration of a speech
//! walk. Anything that captures audio registers a callback that runs the
//! moment the gate goes up, and checks [`EchoGate::is_speaking`] before it
//! starts listening again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type SpeakingCallback = Arc<dyn Fn() + Send + Sync>;

struct GateInner {
    speaking: AtomicBool,
    on_speaking: Mutex<Vec<SpeakingCallback>>,
}

/// Shared flag coordinating speech playback with speech capture.
///
/// Clones share state.
#[derive(Clone)]
pub struct EchoGate {
    inner: Arc<GateInner>,
}

impl EchoGate {
    /// Create a new echo gate (initially silent).
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                speaking: AtomicBool::new(false),
                on_speaking: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a callback fired every time speech output begins.
    ///
    /// Callbacks run synchronously on the task that raised the gate and must
    /// not block.
    pub fn on_speaking_started<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .on_speaking
            .lock()
            .unwrap()
            .push(Arc::new(callback));
    }

    /// Mark speech output as active and notify listeners.
    ///
    /// Listeners are only notified on the silent -> speaking transition.
    pub fn start_speaking(&self) {
        let was_speaking = self.inner.speaking.swap(true, Ordering::SeqCst);
        if was_speaking {
            return;
        }
        tracing::debug!("Echo gate raised, microphone suppressed");

        // Clone out so callbacks may register further callbacks.
        let callbacks: Vec<SpeakingCallback> = self.inner.on_speaking.lock().unwrap().clone();
        for callback in callbacks {
            callback();
        }
    }

    /// Mark speech output as finished.
    pub fn stop_speaking(&self) {
        if self.inner.speaking.swap(false, Ordering::SeqCst) {
            tracing::debug!("Echo gate lowered");
        }
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.inner.speaking.load(Ordering::SeqCst)
    }
}

impl Default for EchoGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EchoGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoGate")
            .field("speaking", &self.is_speaking())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn gate_starts_silent() {
        assert!(!EchoGate::new().is_speaking());
    }

    #[test]
    fn clones_share_state() {
        let gate = EchoGate::new();
        let other = gate.clone();

        gate.start_speaking();
        assert!(other.is_speaking());

        other.stop_speaking();
        assert!(!gate.is_speaking());
    }

    #[test]
    fn callbacks_fire_once_per_transition() {
        let gate = EchoGate::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        gate.on_speaking_started(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        gate.start_speaking();
        gate.start_speaking();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        gate.stop_speaking();
        gate.start_speaking();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
