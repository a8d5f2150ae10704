//! Speech input controller.
//!
//! Wraps one recognition session at a time:
//!
//! ```text
//!   Idle → Listening → Recognized ─┐
//!             │  ├──→ Error ───────┤
//!             │  └──→ Stopped ─────┤
//!             ▲                    ▼
//!             └─────────────── Idle
//! ```
//!
//! Final results pass a noise filter first. In single-shot mode a final
//! result fills the input field; in hands-free mode it is held for a debounce
//! window and auto-submitted unless more speech arrives. The controller never
//! restarts itself; the conversation loop decides when hands-free listening
//! resumes.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::VoiceError;
use crate::gate::EchoGate;

/// Fillers that never count as an utterance on their own.
pub const DEFAULT_STOPLIST: &[&str] = &["um", "uh", "the", "a", "an", "hmm", "ah", "oh", "er", "mm"];

// ── Recognizer port ────────────────────────────────────────────────

/// How a listening session was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecognitionMode {
    /// One utterance, placed into the input field.
    #[default]
    SingleShot,
    /// Continuous driving mode with auto-submit.
    HandsFree,
}

/// Raw events from a speech recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Interim {
        text: String,
    },
    Final {
        text: String,
        /// Recognizer confidence in `0.0..=1.0`, when reported.
        confidence: Option<f32>,
    },
    Ended,
    Error(String),
}

/// A speech recognition engine.
///
/// `start` begins a session whose events are delivered on `events`; the
/// recognizer drops the sender when the session is over.
pub trait SpeechRecognizer: Send + Sync {
    fn start(
        &self,
        mode: RecognitionMode,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), VoiceError>;

    fn stop(&self);
}

// ── Controller state and events ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputState {
    Idle,
    Listening,
    Recognized,
    Error,
    Stopped,
}

/// Events emitted to the conversation loop.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    StateChanged(InputState),

    /// Interim text, hands-free only.
    Interim { text: String },

    /// Single-shot result for the input field.
    Dictated { text: String },

    /// Hands-free result whose debounce window elapsed.
    AutoSubmit { text: String },

    /// A final result discarded by the noise filter.
    NoiseRejected { text: String },

    Error(String),
}

// ── Configuration ──────────────────────────────────────────────────

/// Noise filter and debounce settings.
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub debounce: Duration,
    pub min_chars: usize,
    pub confidence_threshold: f32,
    pub stoplist: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            min_chars: 3,
            confidence_threshold: 0.5,
            stoplist: DEFAULT_STOPLIST.iter().map(ToString::to_string).collect(),
        }
    }
}

impl InputConfig {
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub const fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_stoplist<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stoplist = words.into_iter().map(Into::into).collect();
        self
    }
}

/// Whether a final result should be discarded as noise.
#[must_use]
pub fn is_noise(text: &str, confidence: Option<f32>, config: &InputConfig) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(['.', ',', '!', '?'])
        .to_lowercase();

    if config.stoplist.iter().any(|word| *word == normalized) {
        return true;
    }
    if normalized.chars().count() < config.min_chars {
        return true;
    }
    confidence.is_some_and(|c| c < config.confidence_threshold)
}

// ── Controller ─────────────────────────────────────────────────────

struct PendingSubmit {
    text: String,
    timer: JoinHandle<()>,
}

struct ControllerState {
    state: InputState,
    mode: RecognitionMode,
    /// Bumped on every start/halt so stale recognizer events are ignored.
    session: u64,
    pump: Option<JoinHandle<()>>,
    pending: Option<PendingSubmit>,
    submit_generation: u64,
}

struct InputInner {
    recognizer: Arc<dyn SpeechRecognizer>,
    config: InputConfig,
    gate: EchoGate,
    events: mpsc::UnboundedSender<InputEvent>,
    state: Mutex<ControllerState>,
}

/// Owns the recognition session and the auto-submit debounce.
#[derive(Clone)]
pub struct SpeechInputController {
    inner: Arc<InputInner>,
}

impl SpeechInputController {
    /// Create a controller bound to `gate`.
    ///
    /// Whenever the gate is raised any active session is force-stopped and a
    /// pending auto-submit is dropped.
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        config: InputConfig,
        gate: &EchoGate,
    ) -> (Self, mpsc::UnboundedReceiver<InputEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(InputInner {
            recognizer,
            config,
            gate: gate.clone(),
            events,
            state: Mutex::new(ControllerState {
                state: InputState::Idle,
                mode: RecognitionMode::default(),
                session: 0,
                pump: None,
                pending: None,
                submit_generation: 0,
            }),
        });

        let weak = Arc::downgrade(&inner);
        gate.on_speaking_started(move || {
            if let Some(inner) = weak.upgrade() {
                inner.halt("speech output started");
            }
        });

        (Self { inner }, events_rx)
    }

    /// Begin a listening session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, mode: RecognitionMode) -> Result<(), VoiceError> {
        if self.inner.gate.is_speaking() {
            return Err(VoiceError::SystemSpeaking);
        }

        let mut st = self.inner.state.lock().unwrap();
        if matches!(st.state, InputState::Listening | InputState::Recognized) {
            return Err(VoiceError::AlreadyListening);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.recognizer.start(mode, tx)?;

        st.session += 1;
        st.mode = mode;
        self.inner.transition(&mut st, InputState::Listening);
        tracing::debug!(?mode, session = st.session, "Listening started");

        let session = st.session;
        st.pump = Some(tokio::spawn(pump(Arc::downgrade(&self.inner), session, rx)));
        Ok(())
    }

    /// Stop listening and drop any pending auto-submit.
    pub fn stop(&self) {
        self.inner.halt("stopped by caller");
    }

    /// Drop a pending auto-submit without touching the session.
    pub fn cancel_pending_submit(&self) {
        let mut st = self.inner.state.lock().unwrap();
        InputInner::cancel_pending(&mut st);
    }

    #[must_use]
    pub fn state(&self) -> InputState {
        self.inner.state.lock().unwrap().state
    }

    #[must_use]
    pub fn mode(&self) -> RecognitionMode {
        self.inner.state.lock().unwrap().mode
    }

    /// Listening, or holding a result the recognizer has not closed yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self.state(),
            InputState::Listening | InputState::Recognized
        )
    }

    #[must_use]
    pub fn has_pending_submit(&self) -> bool {
        self.inner.state.lock().unwrap().pending.is_some()
    }
}

async fn pump(
    weak: Weak<InputInner>,
    session: u64,
    mut rx: mpsc::UnboundedReceiver<RecognitionEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        if !inner.handle(session, event) {
            break;
        }
    }
}

impl InputInner {
    fn emit(&self, event: InputEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Input event receiver dropped");
        }
    }

    fn transition(&self, st: &mut ControllerState, next: InputState) {
        if st.state != next {
            st.state = next;
            self.emit(InputEvent::StateChanged(next));
        }
    }

    /// Apply one recognizer event. Returns `false` once the session is over.
    fn handle(self: &Arc<Self>, session: u64, event: RecognitionEvent) -> bool {
        let mut st = self.state.lock().unwrap();
        if st.session != session {
            return false;
        }

        match event {
            RecognitionEvent::Interim { text } => {
                if st.mode == RecognitionMode::HandsFree {
                    self.emit(InputEvent::Interim { text });
                    // Still talking: push the auto-submit back.
                    if let Some(pending) = st.pending.take() {
                        pending.timer.abort();
                        self.schedule_submit(&mut st, pending.text);
                    }
                }
                true
            }
            RecognitionEvent::Final { text, confidence } => {
                if is_noise(&text, confidence, &self.config) {
                    tracing::debug!(%text, ?confidence, "Discarding noise");
                    self.emit(InputEvent::NoiseRejected { text });
                    return true;
                }
                self.transition(&mut st, InputState::Recognized);
                let text = text.trim().to_string();
                let mode = st.mode;
                match mode {
                    RecognitionMode::SingleShot => self.emit(InputEvent::Dictated { text }),
                    RecognitionMode::HandsFree => {
                        let combined = match st.pending.take() {
                            Some(pending) => {
                                pending.timer.abort();
                                format!("{} {text}", pending.text)
                            }
                            None => text,
                        };
                        self.schedule_submit(&mut st, combined);
                    }
                }
                true
            }
            RecognitionEvent::Ended => {
                st.pump = None;
                self.transition(&mut st, InputState::Idle);
                false
            }
            RecognitionEvent::Error(message) => {
                tracing::warn!(error = %message, "Speech recognition error");
                st.pump = None;
                self.transition(&mut st, InputState::Error);
                self.emit(InputEvent::Error(message));
                self.transition(&mut st, InputState::Idle);
                false
            }
        }
    }

    fn schedule_submit(self: &Arc<Self>, st: &mut ControllerState, text: String) {
        st.submit_generation += 1;
        let generation = st.submit_generation;
        let delay = self.config.debounce;
        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_submit(generation);
            }
        });
        st.pending = Some(PendingSubmit { text, timer });
    }

    fn fire_submit(&self, generation: u64) {
        let mut st = self.state.lock().unwrap();
        if st.submit_generation != generation {
            return;
        }
        if let Some(pending) = st.pending.take() {
            tracing::debug!(text = %pending.text, "Auto-submitting utterance");
            self.emit(InputEvent::AutoSubmit { text: pending.text });
        }
    }

    fn cancel_pending(st: &mut ControllerState) {
        if let Some(pending) = st.pending.take() {
            pending.timer.abort();
            st.submit_generation += 1;
        }
    }

    fn halt(&self, reason: &str) {
        let mut st = self.state.lock().unwrap();
        Self::cancel_pending(&mut st);

        if !matches!(st.state, InputState::Listening | InputState::Recognized) {
            return;
        }

        st.session += 1;
        if let Some(pump) = st.pump.take() {
            pump.abort();
        }
        self.recognizer.stop();
        tracing::debug!(reason, "Listening stopped");
        self.transition(&mut st, InputState::Stopped);
        self.transition(&mut st, InputState::Idle);
    }
}

impl std::fmt::Debug for SpeechInputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechInputController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InputConfig {
        InputConfig::default()
    }

    #[test]
    fn fillers_are_noise() {
        assert!(is_noise("um", None, &config()));
        assert!(is_noise("  The. ", Some(0.99), &config()));
        assert!(is_noise("Hmm?", None, &config()));
    }

    #[test]
    fn short_text_is_noise() {
        assert!(is_noise("ok", Some(0.95), &config()));
        assert!(!is_noise("yes", Some(0.95), &config()));
    }

    #[test]
    fn low_confidence_is_noise() {
        assert!(is_noise("turn on the lights", Some(0.3), &config()));
        assert!(!is_noise("turn on the lights", Some(0.9), &config()));
        assert!(!is_noise("turn on the lights", None, &config()));
    }

    #[test]
    fn custom_stoplist() {
        let config = InputConfig::default().with_stoplist(["okay"]);
        assert!(is_noise("Okay", None, &config));
        assert!(!is_noise("the", None, &config.clone().with_min_chars(1)));
    }
}
