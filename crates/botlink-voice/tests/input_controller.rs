//! Speech input controller: noise filter, debounce and echo-gate coupling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use botlink_voice::{
    EchoGate, InputConfig, InputEvent, InputState, RecognitionEvent, RecognitionMode,
    SpeechInputController, SpeechRecognizer, VoiceError,
};
use tokio::sync::mpsc;

#[derive(Default)]
struct FakeRecognizer {
    sender: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeRecognizer {
    fn say(&self, event: RecognitionEvent) {
        if let Some(tx) = self.sender.lock().unwrap().as_ref() {
            tx.send(event).unwrap();
        }
    }

    fn final_result(&self, text: &str, confidence: f32) {
        self.say(RecognitionEvent::Final {
            text: text.to_string(),
            confidence: Some(confidence),
        });
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(
        &self,
        _mode: RecognitionMode,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), VoiceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.sender.lock().unwrap() = Some(events);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
    }
}

struct Harness {
    recognizer: Arc<FakeRecognizer>,
    gate: EchoGate,
    controller: SpeechInputController,
    events: mpsc::UnboundedReceiver<InputEvent>,
}

fn harness() -> Harness {
    let recognizer = Arc::new(FakeRecognizer::default());
    let gate = EchoGate::new();
    let (controller, events) =
        SpeechInputController::new(recognizer.clone(), InputConfig::default(), &gate);
    Harness {
        recognizer,
        gate,
        controller,
        events,
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<InputEvent>) -> Vec<InputEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn auto_submits(events: &[InputEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            InputEvent::AutoSubmit { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn hands_free_final_auto_submits_after_debounce() {
    let mut h = harness();
    h.controller.start(RecognitionMode::HandsFree).unwrap();
    assert_eq!(h.controller.state(), InputState::Listening);

    h.recognizer.final_result("turn on the lights", 0.9);
    settle().await;
    assert!(h.controller.has_pending_submit());

    tokio::time::sleep(Duration::from_millis(1900)).await;
    settle().await;
    assert!(auto_submits(&drain(&mut h.events)).is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(auto_submits(&drain(&mut h.events)), vec!["turn on the lights"]);
    assert!(!h.controller.has_pending_submit());
}

#[tokio::test(start_paused = true)]
async fn filler_never_auto_submits() {
    let mut h = harness();
    h.controller.start(RecognitionMode::HandsFree).unwrap();

    h.recognizer.final_result("um", 0.99);
    settle().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    let events = drain(&mut h.events);
    assert!(auto_submits(&events).is_empty());
    assert!(events.contains(&InputEvent::NoiseRejected {
        text: "um".to_string()
    }));
    assert_eq!(h.controller.state(), InputState::Listening);
}

#[tokio::test(start_paused = true)]
async fn later_final_supersedes_and_combines() {
    let mut h = harness();
    h.controller.start(RecognitionMode::HandsFree).unwrap();

    h.recognizer.final_result("turn on", 0.9);
    settle().await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    h.recognizer.final_result("the kitchen lights", 0.8);
    settle().await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    settle().await;
    assert!(auto_submits(&drain(&mut h.events)).is_empty());

    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;
    assert_eq!(
        auto_submits(&drain(&mut h.events)),
        vec!["turn on the kitchen lights"]
    );
}

#[tokio::test(start_paused = true)]
async fn interim_results_extend_the_window_and_surface_live() {
    let mut h = harness();
    h.controller.start(RecognitionMode::HandsFree).unwrap();

    h.recognizer.final_result("what is", 0.9);
    settle().await;
    tokio::time::sleep(Duration::from_millis(1800)).await;
    h.recognizer.say(RecognitionEvent::Interim {
        text: "the weather".to_string(),
    });
    settle().await;

    tokio::time::sleep(Duration::from_millis(1000)).await;
    settle().await;
    let events = drain(&mut h.events);
    assert!(auto_submits(&events).is_empty());
    assert!(events.contains(&InputEvent::Interim {
        text: "the weather".to_string()
    }));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    settle().await;
    assert_eq!(auto_submits(&drain(&mut h.events)), vec!["what is"]);
}

#[tokio::test(start_paused = true)]
async fn single_shot_fills_input_without_submit() {
    let mut h = harness();
    h.controller.start(RecognitionMode::SingleShot).unwrap();

    h.recognizer.say(RecognitionEvent::Interim {
        text: "hel".to_string(),
    });
    h.recognizer.final_result("hello there", 0.9);
    h.recognizer.say(RecognitionEvent::Ended);
    settle().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    let events = drain(&mut h.events);
    assert!(events.contains(&InputEvent::Dictated {
        text: "hello there".to_string()
    }));
    assert!(!events.iter().any(|e| matches!(e, InputEvent::Interim { .. })));
    assert!(auto_submits(&events).is_empty());
    assert_eq!(h.controller.state(), InputState::Idle);
}

#[tokio::test(start_paused = true)]
async fn recognition_end_returns_to_idle_without_restart() {
    let mut h = harness();
    h.controller.start(RecognitionMode::HandsFree).unwrap();
    h.recognizer.say(RecognitionEvent::Ended);
    settle().await;

    assert_eq!(h.controller.state(), InputState::Idle);
    assert_eq!(h.recognizer.starts.load(Ordering::SeqCst), 1);
    let states: Vec<_> = drain(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            InputEvent::StateChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![InputState::Listening, InputState::Idle]);
}

#[tokio::test(start_paused = true)]
async fn recognition_error_passes_through_error_state() {
    let mut h = harness();
    h.controller.start(RecognitionMode::SingleShot).unwrap();
    h.recognizer
        .say(RecognitionEvent::Error("no-speech".to_string()));
    settle().await;

    let events = drain(&mut h.events);
    assert!(events.contains(&InputEvent::StateChanged(InputState::Error)));
    assert!(events.contains(&InputEvent::Error("no-speech".to_string())));
    assert_eq!(h.controller.state(), InputState::Idle);
}

#[tokio::test(start_paused = true)]
async fn bot_speech_force_stops_listening_and_cancels_pending() {
    let mut h = harness();
    h.controller.start(RecognitionMode::HandsFree).unwrap();
    h.recognizer.final_result("play some music", 0.9);
    settle().await;
    assert!(h.controller.has_pending_submit());

    h.gate.start_speaking();

    assert_eq!(h.recognizer.stops.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.state(), InputState::Idle);
    assert!(!h.controller.has_pending_submit());

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    let events = drain(&mut h.events);
    assert!(auto_submits(&events).is_empty());
    assert!(events.contains(&InputEvent::StateChanged(InputState::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn cannot_listen_while_bot_speaks() {
    let h = harness();
    h.gate.start_speaking();
    let err = h.controller.start(RecognitionMode::HandsFree).unwrap_err();
    assert!(matches!(err, VoiceError::SystemSpeaking));
    assert_eq!(h.recognizer.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn double_start_is_refused() {
    let h = harness();
    h.controller.start(RecognitionMode::SingleShot).unwrap();
    let err = h.controller.start(RecognitionMode::SingleShot).unwrap_err();
    assert!(matches!(err, VoiceError::AlreadyListening));
}

#[tokio::test(start_paused = true)]
async fn events_after_stop_are_ignored() {
    let mut h = harness();
    h.controller.start(RecognitionMode::SingleShot).unwrap();
    let stale = h.recognizer.sender.lock().unwrap().clone().unwrap();
    h.controller.stop();

    stale
        .send(RecognitionEvent::Final {
            text: "too late now".to_string(),
            confidence: None,
        })
        .ok();
    settle().await;

    let events = drain(&mut h.events);
    assert!(!events.iter().any(|e| matches!(e, InputEvent::Dictated { .. })));
}
