#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod cloud;
pub mod error;
pub mod gate;
pub mod input;
pub mod lock;
pub mod output;
pub mod provider;
pub mod text;

// Re-export key types for convenience
pub use cloud::{AudioSink, CloudSpeechConfig, CloudSpeechProvider, TokenCache};
pub use error::VoiceError;
pub use gate::EchoGate;
pub use input::{
    InputConfig, InputEvent, InputState, RecognitionEvent, RecognitionMode, SpeechInputController,
    SpeechRecognizer, is_noise,
};
pub use lock::{SpeechLock, SpeechLockGuard};
pub use output::{SpeakOutcome, SpeechCoordinator, SpeechOutput};
pub use provider::{ProviderChain, SpeechProvider};
pub use text::speech_text;

