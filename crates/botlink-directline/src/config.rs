//! Public configuration for the Direct Line client.

use std::time::Duration;

use crate::error::{DirectLineError, DirectLineResult};

/// Configuration for the Direct Line client.
///
/// Use the builder methods to customize it.
///
/// # Example
///
/// ```
/// use botlink_directline::DirectLineConfig;
/// use std::time::Duration;
///
/// let config = DirectLineConfig::new("secret")
///     .with_user_id("user-1")
///     .with_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DirectLineConfig {
    pub(crate) base_url: String,
    pub(crate) secret: String,
    pub(crate) user_id: String,
    pub(crate) user_name: String,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u8,
    pub(crate) retry_base_delay: Duration,
}

impl Default for DirectLineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://directline.botframework.com/v3/directline".to_string(),
            secret: String::new(),
            user_id: "botlink-user".to_string(),
            user_name: "User".to_string(),
            user_agent: concat!("botlink-directline/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl DirectLineConfig {
    /// Configuration with the given channel secret and default settings.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Defaults to the public Direct Line endpoint.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Id that user turns are posted under.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries after the first attempt for transient failures. Defaults to 3.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Base delay for exponential backoff. Defaults to 500ms.
    #[must_use]
    pub const fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Check that the client can be built from this configuration.
    pub fn validate(&self) -> DirectLineResult<()> {
        if self.secret.trim().is_empty() {
            return Err(DirectLineError::MissingSecret);
        }
        if self.user_id.trim().is_empty() {
            return Err(DirectLineError::InvalidConfig {
                message: "user id cannot be empty".to_string(),
            });
        }
        url::Url::parse(&self.base_url)?;
        Ok(())
    }
}
