//! The conversation loop.
//!
//! [`ConversationSession`] owns the cursor and the transcript. A background
//! task drives three things at once:
//!
//! - the poll tick, which fetches turns past the watermark and feeds new bot
//!   messages to the speech coordinator,
//! - the availability tick, which restarts hands-free listening once nothing
//!   else is going on and expires a stale "awaiting reply" flag,
//! - input events from the speech input controller.
//!
//! Polls are serialized; a poll that finishes after the conversation was
//! replaced is discarded whole.

use std::sync::{Arc, Mutex, MutexGuard};

use botlink_core::{
    ChatMessage, ChatTransport, ConversationCursor, FileUpload, KeyValueStore, OutgoingMessage,
    RejectedFile, SessionEvent, SessionEventEmitter, SessionStatus, SessionStore,
    TurnDeduplicator, WidgetSettings, WidgetSettingsUpdate, prepare_attachments,
};
use botlink_voice::{
    EchoGate, InputEvent, InputState, RecognitionMode, SpeakOutcome, SpeechCoordinator,
    SpeechInputController, SpeechOutput, SpeechRecognizer, VoiceError,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;

/// Everything a session talks to.
pub struct SessionPorts {
    pub transport: Arc<dyn ChatTransport>,
    pub store: Arc<dyn KeyValueStore>,
    pub speech_output: Arc<dyn SpeechOutput>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub emitter: Arc<dyn SessionEventEmitter>,
}

// ── Shared state ───────────────────────────────────────────────────

struct LoopState {
    status: SessionStatus,
    cursor: Option<ConversationCursor>,
    transcript: Vec<ChatMessage>,
    seen: TurnDeduplicator,
    settings: WidgetSettings,
    hands_free: bool,
    sending: bool,
    awaiting_since: Option<Instant>,
}

impl LoopState {
    fn is_current(&self, conversation_id: &str) -> bool {
        self.cursor
            .as_ref()
            .is_some_and(|cursor| cursor.conversation_id == conversation_id)
    }

    fn conversation_id(&self) -> Option<String> {
        self.cursor
            .as_ref()
            .map(|cursor| cursor.conversation_id.clone())
    }
}

struct Shared {
    transport: Arc<dyn ChatTransport>,
    store: SessionStore,
    emitter: Arc<dyn SessionEventEmitter>,
    speech: SpeechCoordinator,
    input: SpeechInputController,
    config: SessionConfig,
    state: Mutex<LoopState>,
    poll_lock: tokio::sync::Mutex<()>,
    persist_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap()
    }

    fn emit(&self, event: SessionEvent) {
        debug!(event = event.name(), "Session event");
        self.emitter.emit(event);
    }

    fn set_status(&self, status: SessionStatus) {
        {
            let mut st = self.state();
            if st.status == status {
                return;
            }
            st.status = status.clone();
        }
        self.emit(SessionEvent::StatusChanged(status));
    }

    fn thinking(&self, on: bool) {
        let enabled = self.state().settings.thinking_sound;
        if enabled {
            self.emit(SessionEvent::Thinking(on));
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Save the current transcript tail.
    ///
    /// The copy is taken after the write lock is held, so a slower writer can
    /// never replace a newer snapshot with an older one.
    async fn persist_transcript(&self) {
        let _writing = self.persist_lock.lock().await;
        let snapshot = self.state().transcript.clone();
        if let Err(e) = self.store.save_transcript(&snapshot).await {
            warn!(error = %e, "Failed to persist transcript");
        }
    }

    // ── Connect ────────────────────────────────────────────────────

    /// Resume the stored conversation if the remote still knows it,
    /// otherwise open a new one.
    async fn connect(self: &Arc<Self>) -> Result<(), SessionError> {
        let settings = match self.store.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load settings, using defaults");
                WidgetSettings::default()
            }
        };
        self.speech.set_voice_profile(&settings.voice_profile);
        self.state().settings = settings;

        let stored = match self.store.load_cursor().await {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!(error = %e, "Failed to load stored cursor");
                None
            }
        };

        if let Some(cursor) = stored {
            let conversation_id = cursor.conversation_id.clone();
            match self
                .transport
                .reconnect_conversation(&conversation_id, cursor.watermark.as_deref())
                .await
            {
                Ok(true) => {
                    self.resume(cursor).await;
                    return Ok(());
                }
                Ok(false) => info!(%conversation_id, "Stored conversation expired"),
                Err(e) => {
                    warn!(%conversation_id, error = %e, "Reconnect failed, starting a new conversation");
                }
            }
            if let Err(e) = self.store.clear_cursor().await {
                warn!(error = %e, "Failed to clear stored cursor");
            }
        }

        self.open_fresh().await
    }

    async fn resume(&self, cursor: ConversationCursor) {
        let snapshot = match self.store.load_transcript().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to load transcript snapshot");
                Vec::new()
            }
        };
        let conversation_id = cursor.conversation_id.clone();

        let len = {
            let mut st = self.state();
            st.seen.seed(snapshot.iter().map(|message| message.id.clone()));
            st.transcript = snapshot;
            st.cursor = Some(cursor);
            st.transcript.len()
        };

        info!(%conversation_id, restored = len, "Conversation resumed");
        self.emit(SessionEvent::TranscriptChanged { len });
        self.set_status(SessionStatus::Connected { conversation_id });
    }

    async fn open_fresh(self: &Arc<Self>) -> Result<(), SessionError> {
        let conversation_id = self
            .transport
            .start_conversation()
            .await
            .map_err(SessionError::from_start)?;

        let cursor = ConversationCursor::new(conversation_id.clone());
        if let Err(e) = self.store.save_cursor(&cursor).await {
            warn!(%conversation_id, error = %e, "Failed to persist cursor");
        }
        self.state().cursor = Some(cursor);

        info!(%conversation_id, "Conversation started");
        self.set_status(SessionStatus::Connected {
            conversation_id: conversation_id.clone(),
        });

        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.handshake(conversation_id).await });
        Ok(())
    }

    /// Wake signal, grace wait, then the silent greeting if the bot has not
    /// said anything yet.
    async fn handshake(self: Arc<Self>, conversation_id: String) {
        if let Err(e) = self
            .transport
            .trigger_conversation_start(&conversation_id)
            .await
        {
            debug!(%conversation_id, error = %e, "Wake signal failed");
        }

        tokio::select! {
            () = self.cancel.cancelled() => return,
            () = tokio::time::sleep(self.config.handshake_grace) => {}
        }

        if let Err(e) = self.poll_once().await {
            debug!(%conversation_id, error = %e, "Handshake poll failed");
        }

        let greeted = {
            let st = self.state();
            if !st.is_current(&conversation_id) {
                return;
            }
            st.transcript.iter().any(|message| !message.is_from_user)
        };
        if greeted {
            debug!(%conversation_id, "Bot greeted on its own");
            return;
        }

        debug!(%conversation_id, "No greeting yet, sending silent greeting");
        let greeting = OutgoingMessage::silent_greeting(self.config.greeting.as_str());
        if let Err(e) = self.transport.send_message(&conversation_id, &greeting).await {
            warn!(%conversation_id, error = %e, "Silent greeting failed");
        }
    }

    // ── Poll ───────────────────────────────────────────────────────

    async fn poll_once(self: &Arc<Self>) -> Result<usize, SessionError> {
        self.ensure_open()?;
        let _serial = self.poll_lock.lock().await;

        let (conversation_id, watermark) = {
            let st = self.state();
            let cursor = st.cursor.as_ref().ok_or(SessionError::NotStarted)?;
            (cursor.conversation_id.clone(), cursor.watermark.clone())
        };

        let batch = match self
            .transport
            .fetch_turns(&conversation_id, watermark.as_deref())
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(%conversation_id, error = %e, "Poll failed");
                self.emit(SessionEvent::PollFailed {
                    message: e.to_string(),
                });
                return Err(SessionError::PollFailed(e));
            }
        };
        let turns = batch.turns.len();

        let (cursor, fresh, len, reply_arrived, speak) = {
            let mut guard = self.state();
            let st = &mut *guard;
            let Some(cursor) = st
                .cursor
                .as_mut()
                .filter(|cursor| cursor.conversation_id == conversation_id)
            else {
                debug!(%conversation_id, "Conversation replaced during poll, batch discarded");
                return Ok(0);
            };
            cursor.advance(batch.watermark);
            let cursor = cursor.clone();

            let fresh = st.seen.map_new(&batch.turns, self.transport.user_id());
            st.transcript.extend(fresh.iter().cloned());

            let bot_replied = fresh.iter().any(|message| !message.is_from_user);
            let reply_arrived = bot_replied && st.awaiting_since.take().is_some();
            let speak = !st.settings.muted || st.hands_free;
            (cursor, fresh, st.transcript.len(), reply_arrived, speak)
        };

        debug!(
            %conversation_id,
            watermark = ?cursor.watermark,
            turns,
            new = fresh.len(),
            "Poll complete"
        );
        if let Err(e) = self.store.save_cursor(&cursor).await {
            warn!(%conversation_id, error = %e, "Failed to persist cursor");
        }

        if fresh.is_empty() {
            return Ok(0);
        }
        self.emit(SessionEvent::TranscriptChanged { len });
        self.persist_transcript().await;
        if reply_arrived {
            self.thinking(false);
        }

        let bot: Vec<ChatMessage> = fresh
            .iter()
            .filter(|message| !message.is_from_user)
            .cloned()
            .collect();
        if speak && !bot.is_empty() {
            self.speak(bot);
        }
        Ok(fresh.len())
    }

    fn speak(self: &Arc<Self>, messages: Vec<ChatMessage>) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = shared.speech.enqueue_and_speak(&messages).await;
            debug!(?outcome, "Speech walk ended");
        });
    }

    // ── Send ───────────────────────────────────────────────────────

    async fn send_text(self: &Arc<Self>, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.deliver(OutgoingMessage::text(text), text.to_string())
            .await
    }

    /// Append the local copy, post the turn, and track the reply wait.
    async fn deliver(
        self: &Arc<Self>,
        message: OutgoingMessage,
        display: String,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;

        let (conversation_id, len) = {
            let mut st = self.state();
            let conversation_id = st.conversation_id().ok_or(SessionError::NotStarted)?;
            st.sending = true;
            st.transcript.push(ChatMessage::from_user(display));
            st.awaiting_since = Some(Instant::now());
            (conversation_id, st.transcript.len())
        };

        self.input.cancel_pending_submit();
        self.emit(SessionEvent::TranscriptChanged { len });
        self.thinking(true);

        let result = self.transport.send_message(&conversation_id, &message).await;
        self.state().sending = false;
        self.persist_transcript().await;

        match result {
            Ok(()) => {
                debug!(
                    %conversation_id,
                    attachments = message.attachments.len(),
                    "Message sent"
                );
                Ok(())
            }
            Err(e) => {
                warn!(%conversation_id, error = %e, "Send failed");
                self.state().awaiting_since = None;
                self.thinking(false);
                self.emit(SessionEvent::SendFailed {
                    message: e.to_string(),
                });
                Err(SessionError::SendFailed(e))
            }
        }
    }

    // ── Loop helpers ───────────────────────────────────────────────

    /// Expire a stale reply wait, then restart hands-free listening if
    /// nothing else is going on.
    fn check_availability(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let (expired, ready) = {
            let mut st = self.state();
            let expired = st
                .awaiting_since
                .is_some_and(|since| since.elapsed() >= self.config.awaiting_timeout);
            if expired {
                st.awaiting_since = None;
            }
            let ready = st.hands_free
                && !st.sending
                && st.awaiting_since.is_none()
                && matches!(st.status, SessionStatus::Connected { .. });
            (expired, ready)
        };

        if expired {
            debug!("No bot reply before timeout");
            self.thinking(false);
        }
        if !ready || self.speech.is_speaking() || self.input.is_active() {
            return;
        }

        match self.input.start(RecognitionMode::HandsFree) {
            Ok(()) => debug!("Hands-free listening restarted"),
            Err(VoiceError::SystemSpeaking | VoiceError::AlreadyListening) => {}
            Err(e) => warn!(error = %e, "Could not restart hands-free listening"),
        }
    }

    fn handle_input(self: &Arc<Self>, event: InputEvent) {
        match event {
            InputEvent::AutoSubmit { text } => {
                let hands_free = self.state().hands_free;
                if !hands_free {
                    debug!("Dropping auto-submit outside hands-free mode");
                    return;
                }
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = shared.send_text(&text).await {
                        debug!(error = %e, "Auto-submit not sent");
                    }
                });
            }
            InputEvent::Dictated { text } => self.emit(SessionEvent::InputFieldFilled { text }),
            InputEvent::Interim { text } => self.emit(SessionEvent::LiveTranscript { text }),
            InputEvent::NoiseRejected { text } => debug!(%text, "Ignored noise"),
            InputEvent::StateChanged(state) => debug!(?state, "Input state changed"),
            InputEvent::Error(message) => warn!(%message, "Speech recognition error"),
        }
    }
}

async fn run(shared: Arc<Shared>, mut input_events: UnboundedReceiver<InputEvent>) {
    let mut poll = interval(shared.config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut availability = interval(shared.config.availability_interval);
    availability.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            _ = poll.tick() => {
                // Failures are logged and emitted inside; next tick retries.
                let _ = shared.poll_once().await;
            }
            _ = availability.tick() => shared.check_availability(),
            Some(event) = input_events.recv() => shared.handle_input(event),
        }
    }

    info!("Conversation loop stopped");
}

// ── Public handle ──────────────────────────────────────────────────

/// One chat widget conversation.
///
/// Must be used from within a tokio runtime. Dropping the session stops the
/// background loop.
pub struct ConversationSession {
    shared: Arc<Shared>,
    input_events: Mutex<Option<UnboundedReceiver<InputEvent>>>,
    run_loop: Mutex<Option<JoinHandle<()>>>,
}

impl ConversationSession {
    #[must_use]
    pub fn new(ports: SessionPorts, config: SessionConfig) -> Self {
        let gate = EchoGate::new();
        let (input, input_events) =
            SpeechInputController::new(ports.recognizer, config.input.clone(), &gate);
        let speech = SpeechCoordinator::new(ports.speech_output, gate);
        let store = SessionStore::new(ports.store)
            .with_snapshot_limit(config.snapshot_limit)
            .with_cursor_expiry(config.cursor_expiry);

        let shared = Arc::new(Shared {
            transport: ports.transport,
            store,
            emitter: ports.emitter,
            speech,
            input,
            config,
            state: Mutex::new(LoopState {
                status: SessionStatus::Idle,
                cursor: None,
                transcript: Vec::new(),
                seen: TurnDeduplicator::new(),
                settings: WidgetSettings::default(),
                hands_free: false,
                sending: false,
                awaiting_since: None,
            }),
            poll_lock: tokio::sync::Mutex::new(()),
            persist_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        });

        Self {
            shared,
            input_events: Mutex::new(Some(input_events)),
            run_loop: Mutex::new(None),
        }
    }

    /// Resume or start a conversation and launch the background loop.
    ///
    /// A failed start leaves the session in `Failed`; calling `start` again
    /// retries.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.shared.ensure_open()?;
        {
            let mut st = self.shared.state();
            if matches!(
                st.status,
                SessionStatus::Connecting | SessionStatus::Connected { .. }
            ) {
                return Err(SessionError::AlreadyStarted);
            }
            st.status = SessionStatus::Connecting;
        }
        self.shared
            .emit(SessionEvent::StatusChanged(SessionStatus::Connecting));

        if let Err(e) = self.shared.connect().await {
            warn!(error = %e, "Session start failed");
            self.shared.set_status(SessionStatus::Failed {
                message: e.to_string(),
            });
            return Err(e);
        }

        let input_events = self.input_events.lock().unwrap().take();
        if let Some(input_events) = input_events {
            let handle = tokio::spawn(run(Arc::clone(&self.shared), input_events));
            *self.run_loop.lock().unwrap() = Some(handle);
        }
        Ok(())
    }

    /// Run one poll cycle now. Returns the number of new messages.
    pub async fn poll_once(&self) -> Result<usize, SessionError> {
        self.shared.poll_once().await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        self.shared.send_text(text).await
    }

    /// Send text with files. Files the policy refuses are returned and never
    /// sent; the rest go out with the text.
    pub async fn send_with_attachments(
        &self,
        text: &str,
        files: Vec<FileUpload>,
    ) -> Result<Vec<RejectedFile>, SessionError> {
        let text = text.trim();
        let prepared = prepare_attachments(files, &self.shared.config.attachment_policy);
        for rejected in &prepared.rejected {
            debug!(file = %rejected.name, reason = ?rejected.reason, "Attachment rejected");
        }

        if prepared.accepted.is_empty() {
            if text.is_empty() {
                if prepared.rejected.is_empty() {
                    return Err(SessionError::EmptyMessage);
                }
                return Ok(prepared.rejected);
            }
            self.shared.send_text(text).await?;
            return Ok(prepared.rejected);
        }

        let display = if text.is_empty() {
            prepared
                .accepted
                .iter()
                .map(|file| file.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            text.to_string()
        };
        let message = OutgoingMessage::with_attachments(text, prepared.accepted);
        self.shared.deliver(message, display).await?;
        Ok(prepared.rejected)
    }

    /// Drop the current conversation and start a fresh one.
    pub async fn new_conversation(&self) -> Result<(), SessionError> {
        self.shared.ensure_open()?;
        let previous = {
            let mut st = self.shared.state();
            let previous = st.conversation_id().ok_or(SessionError::NotStarted)?;
            st.cursor = None;
            st.transcript.clear();
            st.seen.clear();
            st.awaiting_since = None;
            previous
        };

        self.shared.input.stop();
        self.shared.speech.stop();
        self.shared.speech.clear();
        if let Err(e) = self.shared.store.clear_cursor().await {
            warn!(error = %e, "Failed to clear stored cursor");
        }
        info!(conversation_id = %previous, "Conversation abandoned");

        self.shared
            .emit(SessionEvent::TranscriptChanged { len: 0 });
        self.shared.set_status(SessionStatus::Connecting);

        if let Err(e) = self.shared.open_fresh().await {
            warn!(error = %e, "New conversation failed");
            self.shared.set_status(SessionStatus::Failed {
                message: e.to_string(),
            });
            return Err(e);
        }
        Ok(())
    }

    /// Mute or unmute bot speech. Muting stops the current walk; unmuting
    /// does not replay anything (see [`speak_pending`](Self::speak_pending)).
    pub async fn set_muted(&self, muted: bool) -> Result<WidgetSettings, SessionError> {
        self.update_settings(WidgetSettingsUpdate {
            muted: Some(muted),
            ..WidgetSettingsUpdate::default()
        })
        .await
    }

    /// Merge, validate and persist a settings update, then apply it.
    ///
    /// Nothing changes in the session when the store rejects the update.
    pub async fn update_settings(
        &self,
        update: WidgetSettingsUpdate,
    ) -> Result<WidgetSettings, SessionError> {
        let next = self.shared.store.update_settings(&update).await?;

        let (muting, voice_changed) = {
            let mut st = self.shared.state();
            let muting = next.muted && !st.settings.muted;
            let voice_changed = next.voice_profile != st.settings.voice_profile;
            st.settings = next.clone();
            (muting, voice_changed)
        };
        if voice_changed {
            self.shared.speech.set_voice_profile(&next.voice_profile);
        }
        if muting && !self.is_hands_free() {
            self.shared.speech.stop();
        }
        Ok(next)
    }

    pub fn set_hands_free(&self, enabled: bool) {
        self.shared.state().hands_free = enabled;
        info!(enabled, "Hands-free mode");
        if !enabled {
            self.shared.input.stop();
        }
    }

    /// Speak every bot message in the transcript that has not been spoken.
    pub async fn speak_pending(&self) -> SpeakOutcome {
        let pending: Vec<ChatMessage> = self
            .shared
            .state()
            .transcript
            .iter()
            .filter(|message| !message.is_from_user && !self.shared.speech.has_spoken(&message.id))
            .cloned()
            .collect();
        self.shared.speech.enqueue_and_speak(&pending).await
    }

    pub fn stop_speaking(&self) {
        self.shared.speech.stop();
    }

    pub fn pause_speaking(&self) {
        self.shared.speech.pause();
    }

    pub fn resume_speaking(&self) {
        self.shared.speech.resume();
    }

    /// Open the microphone: dictation normally, continuous in hands-free mode.
    pub fn start_listening(&self) -> Result<(), SessionError> {
        self.shared.ensure_open()?;
        let mode = if self.is_hands_free() {
            RecognitionMode::HandsFree
        } else {
            RecognitionMode::SingleShot
        };
        self.shared.input.start(mode)?;
        Ok(())
    }

    pub fn stop_listening(&self) {
        self.shared.input.stop();
    }

    /// Stop the loop, speech and listening. The session cannot be restarted.
    pub async fn shutdown(&self) {
        if self.shared.cancel.is_cancelled() {
            return;
        }
        self.shared.cancel.cancel();
        self.shared.input.stop();
        self.shared.speech.stop();

        let handle = self.run_loop.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Conversation loop task failed");
            }
        }

        self.shared.set_status(SessionStatus::Closed);
        info!("Session closed");
    }

    // ── Accessors ──────────────────────────────────────────────────

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.shared.state().status.clone()
    }

    #[must_use]
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.shared.state().transcript.clone()
    }

    #[must_use]
    pub fn cursor(&self) -> Option<ConversationCursor> {
        self.shared.state().cursor.clone()
    }

    #[must_use]
    pub fn settings(&self) -> WidgetSettings {
        self.shared.state().settings.clone()
    }

    #[must_use]
    pub fn is_hands_free(&self) -> bool {
        self.shared.state().hands_free
    }

    /// Waiting for a bot reply to the last send.
    #[must_use]
    pub fn is_awaiting_reply(&self) -> bool {
        self.shared.state().awaiting_since.is_some()
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.shared.speech.is_speaking()
    }

    #[must_use]
    pub fn has_spoken(&self, message_id: &str) -> bool {
        self.shared.speech.has_spoken(message_id)
    }

    #[must_use]
    pub fn input_state(&self) -> InputState {
        self.shared.input.state()
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        self.shared.input.stop();
        self.shared.speech.stop();
    }
}
