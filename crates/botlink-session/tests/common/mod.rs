//! Hand-written fakes shared by the session integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use botlink_core::{
    ChatTransport, KeyValueStore, MemoryStore, OutgoingMessage, SessionEvent,
    SessionEventEmitter, TransportError, Turn, TurnBatch, VoiceProfile,
};
use botlink_session::{ConversationSession, SessionConfig, SessionPorts};
use botlink_voice::{RecognitionEvent, RecognitionMode, SpeechOutput, SpeechRecognizer, VoiceError};
use tokio::sync::mpsc;

pub const USER_ID: &str = "user-1";
pub const BOT_ID: &str = "bot";

// ── Transport ──────────────────────────────────────────────────────

#[derive(Default)]
struct ServerState {
    started: Vec<String>,
    turns: HashMap<String, Vec<Turn>>,
    sent: Vec<(String, OutgoingMessage)>,
    wakes: usize,
    greeting_on_wake: Option<String>,
    fetches: Vec<(Option<String>, Option<String>)>,
    fail_fetch: bool,
    fail_send: bool,
    fail_start: bool,
    ignore_watermark: bool,
    expired: bool,
    reconnect_error: bool,
    send_delay: Duration,
}

/// In-memory bot service. The watermark is the number of turns already
/// delivered in a conversation.
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<ServerState>,
}

impl FakeServer {
    pub fn current(&self) -> Option<String> {
        self.state.lock().unwrap().started.last().cloned()
    }

    pub fn conversations_started(&self) -> usize {
        self.state.lock().unwrap().started.len()
    }

    /// Add a bot turn to the latest conversation and return its id.
    pub fn bot_says(&self, text: &str) -> String {
        let mut st = self.state.lock().unwrap();
        let conversation_id = st.started.last().cloned().unwrap_or_default();
        let turns = st.turns.entry(conversation_id.clone()).or_default();
        let id = format!("{conversation_id}|{:04}", turns.len());
        turns.push(Turn::message(id.clone(), BOT_ID, text));
        id
    }

    pub fn greet_on_wake(&self, text: &str) {
        self.state.lock().unwrap().greeting_on_wake = Some(text.to_string());
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }

    /// Return every turn on every fetch, as a misbehaving feed would.
    pub fn ignore_watermark(&self) {
        self.state.lock().unwrap().ignore_watermark = true;
    }

    /// Make every existing conversation unknown to reconnects.
    pub fn expire_conversations(&self) {
        self.state.lock().unwrap().expired = true;
    }

    /// Hold every send for `delay` before the service accepts it.
    pub fn set_send_delay(&self, delay: Duration) {
        self.state.lock().unwrap().send_delay = delay;
    }

    pub fn fail_reconnects(&self) {
        self.state.lock().unwrap().reconnect_error = true;
    }

    pub fn wakes(&self) -> usize {
        self.state.lock().unwrap().wakes
    }

    /// `(requested, returned)` watermarks of every successful fetch.
    pub fn fetches(&self) -> Vec<(Option<String>, Option<String>)> {
        self.state.lock().unwrap().fetches.clone()
    }

    /// Visible user texts posted, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(_, message)| !message.silent_greeting)
            .map(|(_, message)| message.text.clone())
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn silent_greetings(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(_, message)| message.silent_greeting)
            .count()
    }
}

#[async_trait]
impl ChatTransport for FakeServer {
    fn user_id(&self) -> &str {
        USER_ID
    }

    async fn start_conversation(&self) -> Result<String, TransportError> {
        let mut st = self.state.lock().unwrap();
        if st.fail_start {
            return Err(TransportError::Rejected {
                status: 403,
                message: "forbidden".to_string(),
            });
        }
        let id = format!("conv-{}", st.started.len() + 1);
        st.started.push(id.clone());
        Ok(id)
    }

    async fn reconnect_conversation(
        &self,
        conversation_id: &str,
        _watermark: Option<&str>,
    ) -> Result<bool, TransportError> {
        let st = self.state.lock().unwrap();
        if st.reconnect_error {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        Ok(!st.expired && st.started.iter().any(|id| id == conversation_id))
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        message: &OutgoingMessage,
    ) -> Result<(), TransportError> {
        let delay = self.state.lock().unwrap().send_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut st = self.state.lock().unwrap();
        if st.fail_send {
            return Err(TransportError::Rejected {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        st.sent.push((conversation_id.to_string(), message.clone()));

        // The service echoes user turns back in the feed.
        let turns = st.turns.entry(conversation_id.to_string()).or_default();
        let id = format!("{conversation_id}|{:04}", turns.len());
        turns.push(Turn::message(id, USER_ID, message.text.clone()));
        Ok(())
    }

    async fn fetch_turns(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<TurnBatch, TransportError> {
        let mut st = self.state.lock().unwrap();
        if st.fail_fetch {
            return Err(TransportError::Network("timed out".to_string()));
        }

        let from = if st.ignore_watermark {
            0
        } else {
            watermark.and_then(|w| w.parse::<usize>().ok()).unwrap_or(0)
        };
        let all = st.turns.get(conversation_id).cloned().unwrap_or_default();
        let returned = Some(all.len().to_string());
        st.fetches
            .push((watermark.map(str::to_string), returned.clone()));

        Ok(TurnBatch {
            turns: all.into_iter().skip(from).collect(),
            watermark: returned,
        })
    }

    async fn trigger_conversation_start(
        &self,
        conversation_id: &str,
    ) -> Result<(), TransportError> {
        let greeting = {
            let mut st = self.state.lock().unwrap();
            st.wakes += 1;
            st.greeting_on_wake.clone()
        };
        if let Some(text) = greeting {
            let mut st = self.state.lock().unwrap();
            let turns = st.turns.entry(conversation_id.to_string()).or_default();
            let id = format!("{conversation_id}|{:04}", turns.len());
            turns.push(Turn::message(id, BOT_ID, text));
        }
        Ok(())
    }
}

// ── Speech output ──────────────────────────────────────────────────

/// Output whose utterances each take `utterance` of simulated time.
pub struct RecordingOutput {
    utterance: Duration,
    spoken: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    stops: AtomicUsize,
    voices: Mutex<Vec<String>>,
}

impl RecordingOutput {
    pub fn new(utterance: Duration) -> Self {
        Self {
            utterance,
            spoken: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            voices: Mutex::new(Vec::new()),
        }
    }

    /// Voice names applied so far, in order.
    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Highest number of utterances ever playing at once.
    pub fn max_overlap(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechOutput for RecordingOutput {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.spoken.lock().unwrap().push(text.to_string());
        tokio::time::sleep(self.utterance).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn set_voice_profile(&self, profile: &VoiceProfile) {
        self.voices.lock().unwrap().push(profile.voice.clone());
    }
}

// ── Speech input ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeRecognizer {
    sender: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    modes: Mutex<Vec<RecognitionMode>>,
    stops: AtomicUsize,
}

impl FakeRecognizer {
    pub fn is_open(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }

    pub fn starts(&self) -> usize {
        self.modes.lock().unwrap().len()
    }

    pub fn last_mode(&self) -> Option<RecognitionMode> {
        self.modes.lock().unwrap().last().copied()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn say(&self, event: RecognitionEvent) {
        if let Some(tx) = self.sender.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn hear(&self, text: &str, confidence: f32) {
        self.say(RecognitionEvent::Final {
            text: text.to_string(),
            confidence: Some(confidence),
        });
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(
        &self,
        mode: RecognitionMode,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), VoiceError> {
        self.modes.lock().unwrap().push(mode);
        *self.sender.lock().unwrap() = Some(events);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
    }
}

// ── Events ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &SessionEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == event)
            .count()
    }
}

impl SessionEventEmitter for RecordingEmitter {
    fn emit(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub session: ConversationSession,
    pub server: Arc<FakeServer>,
    pub store: Arc<MemoryStore>,
    pub output: Arc<RecordingOutput>,
    pub recognizer: Arc<FakeRecognizer>,
    pub emitter: Arc<RecordingEmitter>,
}

pub fn harness() -> Harness {
    harness_with(
        Arc::new(FakeServer::default()),
        Arc::new(MemoryStore::new()),
        SessionConfig::default(),
    )
}

pub fn harness_with(
    server: Arc<FakeServer>,
    store: Arc<MemoryStore>,
    config: SessionConfig,
) -> Harness {
    let output = Arc::new(RecordingOutput::new(Duration::from_millis(100)));
    let recognizer = Arc::new(FakeRecognizer::default());
    let emitter = Arc::new(RecordingEmitter::default());

    let session = ConversationSession::new(
        SessionPorts {
            transport: server.clone(),
            store: store.clone() as Arc<dyn KeyValueStore>,
            speech_output: output.clone(),
            recognizer: recognizer.clone(),
            emitter: emitter.clone(),
        },
        config,
    );

    Harness {
        session,
        server,
        store,
        output,
        recognizer,
        emitter,
    }
}

/// Let spawned tasks catch up. Moves the paused clock by one millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
