//! Bot transport port.
//!
//! The transport is a narrow request/response contract over a polling
//! conversation API. Implementations own any per-conversation credentials;
//! the core only ever deals in conversation ids and watermarks.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{OutgoingMessage, TurnBatch};

/// Errors surfaced by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote answered with a non-success status.
    #[error("Transport request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Network failure, timeout, or connection refused.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote answered with something we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The transport is not usable (e.g. no secret configured).
    #[error("Transport not configured: {0}")]
    NotConfigured(String),
}

impl TransportError {
    /// HTTP status of a rejected request, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the remote conversation is gone (403 / 404).
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self.status(), Some(403 | 404))
    }
}

/// Port for the remote conversation transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Id the transport posts user turns under. Turns from this sender are
    /// never shown as bot messages.
    fn user_id(&self) -> &str;

    /// Start a new remote conversation and return its id.
    async fn start_conversation(&self) -> Result<String, TransportError>;

    /// Check whether a stored conversation is still valid.
    ///
    /// Returns `Ok(false)` when the remote reports it as expired or not found
    /// (403 / 404). Other failures are errors.
    async fn reconnect_conversation(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<bool, TransportError>;

    /// Post a user turn (text, attachments, or the silent greeting).
    async fn send_message(
        &self,
        conversation_id: &str,
        message: &OutgoingMessage,
    ) -> Result<(), TransportError>;

    /// Fetch all turns after `watermark`.
    ///
    /// Always returns the watermark to use next, even when no turns are
    /// returned.
    async fn fetch_turns(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<TurnBatch, TransportError>;

    /// Best-effort wake signal sent right after a conversation starts.
    async fn trigger_conversation_start(&self, conversation_id: &str)
    -> Result<(), TransportError>;
}
