//! Session configuration.

use std::time::Duration;

use botlink_core::AttachmentPolicy;
use botlink_core::services::{CURSOR_EXPIRY_MINUTES, TRANSCRIPT_SNAPSHOT_LIMIT};
use botlink_voice::InputConfig;

/// Text of the hidden greeting sent when a bot does not greet on its own.
pub const DEFAULT_GREETING: &str = "Hello";

/// Timing and policy for a [`ConversationSession`](crate::ConversationSession).
///
/// # Example
///
/// ```
/// use botlink_session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new()
///     .with_poll_interval(Duration::from_secs(5))
///     .with_greeting("Hi there");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) poll_interval: Duration,
    pub(crate) handshake_grace: Duration,
    pub(crate) availability_interval: Duration,
    pub(crate) awaiting_timeout: Duration,
    pub(crate) greeting: String,
    pub(crate) snapshot_limit: usize,
    pub(crate) cursor_expiry: Duration,
    pub(crate) attachment_policy: AttachmentPolicy,
    pub(crate) input: InputConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            handshake_grace: Duration::from_secs(2),
            availability_interval: Duration::from_millis(500),
            awaiting_timeout: Duration::from_secs(20),
            greeting: DEFAULT_GREETING.to_string(),
            snapshot_limit: TRANSCRIPT_SNAPSHOT_LIMIT,
            #[allow(clippy::cast_sign_loss)]
            cursor_expiry: Duration::from_secs(CURSOR_EXPIRY_MINUTES as u64 * 60),
            attachment_policy: AttachmentPolicy::default(),
            input: InputConfig::default(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults to 3 seconds.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wait after the wake signal before falling back to the greeting.
    /// Defaults to 2 seconds.
    #[must_use]
    pub const fn with_handshake_grace(mut self, grace: Duration) -> Self {
        self.handshake_grace = grace;
        self
    }

    /// How often hands-free mode checks whether it may listen again.
    /// Defaults to 500ms.
    #[must_use]
    pub const fn with_availability_interval(mut self, interval: Duration) -> Self {
        self.availability_interval = interval;
        self
    }

    /// Give up waiting for a bot reply after this long. Defaults to 20 seconds.
    #[must_use]
    pub const fn with_awaiting_timeout(mut self, timeout: Duration) -> Self {
        self.awaiting_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    #[must_use]
    pub const fn with_snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_cursor_expiry(mut self, expiry: Duration) -> Self {
        self.cursor_expiry = expiry;
        self
    }

    #[must_use]
    pub fn with_attachment_policy(mut self, policy: AttachmentPolicy) -> Self {
        self.attachment_policy = policy;
        self
    }

    #[must_use]
    pub fn with_input_config(mut self, input: InputConfig) -> Self {
        self.input = input;
        self
    }
}
