//! Widget settings domain types and validation.
//!
//! The settings blob is persisted as JSON through the key-value store port.
//! Every field has a default so older or partial blobs still load.

use serde::{Deserialize, Serialize};

/// Default neural voice used when no profile has been chosen.
pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";

/// Voice selection and prosody for speech output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceProfile {
    /// Provider voice name.
    pub voice: String,
    /// Speaking rate multiplier (0.5–2.0).
    pub rate: f32,
    /// Pitch offset in percent (-50–50).
    pub pitch: i8,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            rate: 1.0,
            pitch: 0,
        }
    }
}

/// Persisted widget settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetSettings {
    /// Bot replies are not spoken while muted (unless hands-free is on).
    pub muted: bool,
    pub voice_profile: VoiceProfile,
    /// Whether the host has already unlocked audio playback with a user
    /// gesture.
    pub audio_unlocked: bool,
    /// Emit thinking notifications while waiting for the bot.
    pub thinking_sound: bool,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            muted: true,
            voice_profile: VoiceProfile::default(),
            audio_unlocked: false,
            thinking_sound: true,
        }
    }
}

impl WidgetSettings {
    /// Apply a partial update, only touching fields that are `Some`.
    pub fn merge(&mut self, update: &WidgetSettingsUpdate) {
        if let Some(muted) = update.muted {
            self.muted = muted;
        }
        if let Some(ref profile) = update.voice_profile {
            self.voice_profile.clone_from(profile);
        }
        if let Some(unlocked) = update.audio_unlocked {
            self.audio_unlocked = unlocked;
        }
        if let Some(thinking) = update.thinking_sound {
            self.thinking_sound = thinking;
        }
    }
}

/// Partial settings update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSettingsUpdate {
    pub muted: Option<bool>,
    pub voice_profile: Option<VoiceProfile>,
    pub audio_unlocked: Option<bool>,
    pub thinking_sound: Option<bool>,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Speaking rate must be between 0.5 and 2.0, got {0}")]
    InvalidRate(f32),

    #[error("Pitch must be between -50 and 50 percent, got {0}")]
    InvalidPitch(i8),

    #[error("Voice name cannot be empty")]
    EmptyVoice,
}

/// Validate settings values.
pub fn validate_settings(settings: &WidgetSettings) -> Result<(), SettingsError> {
    let profile = &settings.voice_profile;

    if !(0.5..=2.0).contains(&profile.rate) {
        return Err(SettingsError::InvalidRate(profile.rate));
    }

    if !(-50..=50).contains(&profile.pitch) {
        return Err(SettingsError::InvalidPitch(profile.pitch));
    }

    if profile.voice.trim().is_empty() {
        return Err(SettingsError::EmptyVoice);
    }

    Ok(())
}
