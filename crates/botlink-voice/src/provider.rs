//! Speech providers and the fallback cascade.
//!
//! Providers are tried in order. An unconfigured provider is skipped and a
//! failing one falls through to the next, so a missing cloud key or a
//! network hiccup degrades to the host's basic voice instead of silence.
//! None of this is surfaced to the user.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use botlink_core::VoiceProfile;

use crate::error::VoiceError;
use crate::output::SpeechOutput;

/// A text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Whether the provider has what it needs to attempt speech.
    fn is_configured(&self) -> bool;

    /// Speak one utterance and resolve once playback has finished.
    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Result<(), VoiceError>;

    fn pause(&self);

    fn resume(&self);

    fn stop(&self);
}

/// Ordered provider cascade implementing [`SpeechOutput`].
pub struct ProviderChain {
    providers: Vec<Arc<dyn SpeechProvider>>,
    profile: Mutex<VoiceProfile>,
    /// Index of the provider playing the current utterance.
    active: Mutex<Option<usize>>,
}

impl ProviderChain {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn SpeechProvider>>) -> Self {
        Self {
            providers,
            profile: Mutex::new(VoiceProfile::default()),
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn voice_profile(&self) -> VoiceProfile {
        self.profile.lock().unwrap().clone()
    }

    fn active_provider(&self) -> Option<Arc<dyn SpeechProvider>> {
        let active = *self.active.lock().unwrap();
        active.and_then(|i| self.providers.get(i).cloned())
    }
}

#[async_trait]
impl SpeechOutput for ProviderChain {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let profile = self.voice_profile();

        for (index, provider) in self.providers.iter().enumerate() {
            if !provider.is_configured() {
                tracing::debug!(provider = provider.name(), "Speech provider not configured, skipping");
                continue;
            }

            *self.active.lock().unwrap() = Some(index);
            let result = provider.speak(text, &profile).await;
            *self.active.lock().unwrap() = None;

            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Speech provider failed, trying next"
                    );
                }
            }
        }

        Err(VoiceError::AllProvidersFailed)
    }

    fn pause(&self) {
        if let Some(provider) = self.active_provider() {
            provider.pause();
        }
    }

    fn resume(&self) {
        if let Some(provider) = self.active_provider() {
            provider.resume();
        }
    }

    fn stop(&self) {
        for provider in &self.providers {
            provider.stop();
        }
    }

    fn set_voice_profile(&self, profile: &VoiceProfile) {
        tracing::debug!(voice = %profile.voice, "Voice profile changed");
        self.profile.lock().unwrap().clone_from(profile);
    }
}
