//! Voice error types.

/// Errors that can occur in speech input or output.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// A provider or recognizer is missing required configuration.
    #[error("Speech service not configured: {0}")]
    NotConfigured(String),

    /// A listening session is already active.
    #[error("Speech recognition is already active")]
    AlreadyListening,

    /// Listening was refused because bot speech is playing.
    #[error("Cannot listen while speech output is playing")]
    SystemSpeaking,

    /// The recognizer could not be started.
    #[error("Speech recognizer unavailable: {0}")]
    RecognizerUnavailable(String),

    /// Failed to obtain an auth token for the speech service.
    #[error("Speech token request failed: {0}")]
    TokenRequest(String),

    /// Failed to synthesize speech.
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// Failed to play synthesized audio.
    #[error("Audio playback failed: {0}")]
    Playback(String),

    /// No provider in the chain was able to speak.
    #[error("All speech providers failed")]
    AllProvidersFailed,
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Synthesis(err.to_string())
    }
}
