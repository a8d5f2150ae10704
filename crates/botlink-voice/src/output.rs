//! Speech output coordinator.
//!
//! Turns bot messages into a strictly ordered sequence of utterances:
//!
//! ```text
//!   enqueue_and_speak(msgs)
//!     ├─ drop ids already spoken, mark the rest spoken
//!     ├─ lock held?  → return Busy (no queue merge)
//!     └─ hold lock + raise echo gate
//!          for each msg: cancelled? → stop
//!                        speak(msg) ; errors logged, walk continues
//!        release lock + lower gate (guard drop, every exit path)
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use botlink_core::{ChatMessage, VoiceProfile};

use crate::error::VoiceError;
use crate::gate::EchoGate;
use crate::lock::{SpeechLock, SpeechLockGuard};
use crate::text::speech_text;

/// Single-utterance speech output.
///
/// `speak` resolves when the utterance has finished playing (or was stopped).
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), VoiceError>;

    fn pause(&self);

    fn resume(&self);

    /// Stop and discard the current utterance.
    fn stop(&self);

    /// Voice for later utterances. Outputs without voice selection ignore it.
    fn set_voice_profile(&self, _profile: &VoiceProfile) {}
}

/// Result of one [`SpeechCoordinator::enqueue_and_speak`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Every message had already been spoken.
    NothingNew,
    /// Another walk holds the lock; new messages were marked spoken only.
    Busy { marked: usize },
    /// The walk ran to the end.
    Finished { spoken: usize, failed: usize },
    /// `stop()` ended the walk early.
    Cancelled { spoken: usize },
}

/// Releases the lock and lowers the echo gate together.
struct WalkGuard<'a> {
    _lock: SpeechLockGuard,
    gate: &'a EchoGate,
}

impl Drop for WalkGuard<'_> {
    fn drop(&mut self) {
        self.gate.stop_speaking();
    }
}

/// Owns the speech lock and the set of spoken message ids.
pub struct SpeechCoordinator {
    output: Arc<dyn SpeechOutput>,
    lock: SpeechLock,
    gate: EchoGate,
    spoken: Mutex<HashSet<String>>,
    cancelled: AtomicBool,
}

impl SpeechCoordinator {
    pub fn new(output: Arc<dyn SpeechOutput>, gate: EchoGate) -> Self {
        Self {
            output,
            lock: SpeechLock::new(),
            gate,
            spoken: Mutex::new(HashSet::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Speak every message not spoken before, in the given order.
    ///
    /// Messages are marked spoken before any playback starts. When another
    /// walk is in progress nothing is spoken by this call.
    pub async fn enqueue_and_speak(&self, messages: &[ChatMessage]) -> SpeakOutcome {
        let mut captured: Vec<&ChatMessage> = Vec::new();
        {
            let mut spoken = self.spoken.lock().unwrap();
            for msg in messages {
                if !msg.is_from_user && spoken.insert(msg.id.clone()) {
                    captured.push(msg);
                }
            }
        }

        if captured.is_empty() {
            return SpeakOutcome::NothingNew;
        }

        let Some(lock) = self.lock.try_acquire() else {
            tracing::debug!(marked = captured.len(), "Speech already in progress, not speaking");
            return SpeakOutcome::Busy {
                marked: captured.len(),
            };
        };

        self.cancelled.store(false, Ordering::SeqCst);
        self.gate.start_speaking();
        let _walk = WalkGuard {
            _lock: lock,
            gate: &self.gate,
        };

        let mut spoken = 0;
        let mut failed = 0;
        for msg in captured {
            if self.cancelled.load(Ordering::SeqCst) {
                tracing::debug!(spoken, "Speech walk cancelled");
                return SpeakOutcome::Cancelled { spoken };
            }

            let text = speech_text(msg.speech_text());
            if text.is_empty() {
                continue;
            }

            match self.output.speak(&text).await {
                Ok(()) => spoken += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(message_id = %msg.id, error = %e, "Failed to speak message");
                }
            }
        }

        SpeakOutcome::Finished { spoken, failed }
    }

    pub fn pause(&self) {
        self.output.pause();
    }

    pub fn resume(&self) {
        self.output.resume();
    }

    pub fn set_voice_profile(&self, profile: &VoiceProfile) {
        self.output.set_voice_profile(profile);
    }

    /// Stop playback and end the current walk before its next message.
    ///
    /// Messages the walk did not reach stay marked spoken.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.output.stop();
    }

    /// Whether a speech walk currently holds the lock.
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.lock.is_held()
    }

    #[must_use]
    pub fn has_spoken(&self, message_id: &str) -> bool {
        self.spoken.lock().unwrap().contains(message_id)
    }

    #[must_use]
    pub fn spoken_count(&self) -> usize {
        self.spoken.lock().unwrap().len()
    }

    /// Forget every spoken id (new conversation).
    pub fn clear(&self) {
        self.spoken.lock().unwrap().clear();
    }

    #[must_use]
    pub fn echo_gate(&self) -> &EchoGate {
        &self.gate
    }
}
