//! Cloud neural voice provider.
//!
//! Synthesizes speech with a regional cognitive-services speech endpoint:
//! a short-lived bearer token is issued from the subscription key, SSML is
//! posted to the synthesis endpoint, and the returned audio is handed to an
//! [`AudioSink`] for playback.
//!
//! The token lives in a [`TokenCache`] owned by the provider instance, so two
//! providers (or two tests) never share credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use botlink_core::VoiceProfile;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::VoiceError;
use crate::provider::SpeechProvider;

/// Issued tokens are valid for ten minutes; refresh a minute early.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(9 * 60);

const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Plays synthesized audio.
///
/// `play` resolves when playback has finished or was stopped.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, audio: Vec<u8>) -> Result<(), VoiceError>;

    fn pause(&self);

    fn resume(&self);

    fn stop(&self);
}

// ── Configuration ──────────────────────────────────────────────────

/// Configuration for [`CloudSpeechProvider`].
#[derive(Debug, Clone)]
pub struct CloudSpeechConfig {
    pub(crate) region: String,
    pub(crate) key: String,
    pub(crate) token_lifetime: Duration,
    pub(crate) timeout: Duration,
}

impl CloudSpeechConfig {
    #[must_use]
    pub fn new(region: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            key: key.into(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            timeout: Duration::from_secs(15),
        }
    }

    /// How long an issued token is reused. Defaults to 9 minutes.
    #[must_use]
    pub const fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "https://{}.api.cognitive.microsoft.com/sts/v1.0/issueToken",
            self.region
        )
    }

    #[must_use]
    pub fn synthesis_url(&self) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        )
    }

    fn is_complete(&self) -> bool {
        !self.region.trim().is_empty() && !self.key.trim().is_empty()
    }
}

// ── Token cache ────────────────────────────────────────────────────

/// A cached bearer token and the instant it stops being reused.
#[derive(Debug, Default, Clone)]
pub struct TokenCache {
    value: Option<String>,
    expiry: Option<Instant>,
}

impl TokenCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: None,
            expiry: None,
        }
    }

    /// The cached token, if still valid at `now`.
    #[must_use]
    pub fn get(&self, now: Instant) -> Option<&str> {
        match (&self.value, self.expiry) {
            (Some(value), Some(expiry)) if now < expiry => Some(value),
            _ => None,
        }
    }

    pub fn store(&mut self, value: String, expiry: Instant) {
        self.value = Some(value);
        self.expiry = Some(expiry);
    }

    pub fn invalidate(&mut self) {
        self.value = None;
        self.expiry = None;
    }
}

// ── Provider ───────────────────────────────────────────────────────

/// Speech provider backed by the cloud synthesis endpoint.
pub struct CloudSpeechProvider {
    config: CloudSpeechConfig,
    client: reqwest::Client,
    cache: Mutex<TokenCache>,
    sink: Arc<dyn AudioSink>,
}

impl CloudSpeechProvider {
    pub fn new(config: CloudSpeechConfig, sink: Arc<dyn AudioSink>) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VoiceError::NotConfigured(e.to_string()))?;

        Ok(Self {
            config,
            client,
            cache: Mutex::new(TokenCache::new()),
            sink,
        })
    }

    async fn token(&self) -> Result<String, VoiceError> {
        let mut cache = self.cache.lock().await;
        let now = Instant::now();
        if let Some(token) = cache.get(now) {
            return Ok(token.to_string());
        }

        tracing::debug!(region = %self.config.region, "Issuing speech token");
        let response = self
            .client
            .post(self.config.token_url())
            .header("Ocp-Apim-Subscription-Key", &self.config.key)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .map_err(|e| VoiceError::TokenRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::TokenRequest(format!("status {status}")));
        }

        let token = response
            .text()
            .await
            .map_err(|e| VoiceError::TokenRequest(e.to_string()))?;
        cache.store(token.clone(), now + self.config.token_lifetime);
        Ok(token)
    }

    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<Vec<u8>, VoiceError> {
        let token = self.token().await?;
        let response = self
            .client
            .post(self.config.synthesis_url())
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(build_ssml(text, profile))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.cache.lock().await.invalidate();
        }
        if !status.is_success() {
            return Err(VoiceError::Synthesis(format!("status {status}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechProvider for CloudSpeechProvider {
    fn name(&self) -> &str {
        "cloud"
    }

    fn is_configured(&self) -> bool {
        self.config.is_complete()
    }

    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Result<(), VoiceError> {
        let audio = self.synthesize(text, profile).await?;
        tracing::debug!(bytes = audio.len(), voice = %profile.voice, "Synthesized utterance");
        self.sink.play(audio).await
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.resume();
    }

    fn stop(&self) {
        self.sink.stop();
    }
}

// ── SSML ───────────────────────────────────────────────────────────

/// Build the SSML document for one utterance.
#[must_use]
pub fn build_ssml(text: &str, profile: &VoiceProfile) -> String {
    let lang = profile
        .voice
        .splitn(3, '-')
        .take(2)
        .collect::<Vec<_>>()
        .join("-");
    format!(
        "<speak version='1.0' xml:lang='{lang}'><voice name='{voice}'>\
         <prosody rate='{rate}' pitch='{pitch}'>{text}</prosody></voice></speak>",
        voice = escape_xml(&profile.voice),
        rate = percent(rate_offset(profile.rate)),
        pitch = percent(i32::from(profile.pitch)),
        text = escape_xml(text),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn rate_offset(rate: f32) -> i32 {
    ((rate - 1.0) * 100.0).round() as i32
}

fn percent(offset: i32) -> String {
    format!("{offset:+}%")
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
