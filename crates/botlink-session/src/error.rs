//! Session error types.

use botlink_core::{SessionStoreError, TransportError};
use botlink_voice::VoiceError;
use thiserror::Error;

/// Errors returned by [`ConversationSession`](crate::ConversationSession).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport is missing its secret or is otherwise unusable.
    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    /// The remote refused to start a conversation.
    #[error("Failed to start conversation: {0}")]
    StartFailed(#[source] TransportError),

    #[error("Session already started")]
    AlreadyStarted,

    #[error("No active conversation")]
    NotStarted,

    #[error("Session is closed")]
    Closed,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Failed to send message: {0}")]
    SendFailed(#[source] TransportError),

    #[error("Poll failed: {0}")]
    PollFailed(#[source] TransportError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

impl SessionError {
    /// Map a failure to start a conversation onto the fatal variants.
    pub(crate) fn from_start(err: TransportError) -> Self {
        match err {
            TransportError::NotConfigured(message) => Self::NotConfigured(message),
            other => Self::StartFailed(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_errors_split_by_kind() {
        let err = SessionError::from_start(TransportError::NotConfigured("no secret".into()));
        assert!(matches!(err, SessionError::NotConfigured(_)));

        let err = SessionError::from_start(TransportError::Rejected {
            status: 401,
            message: String::new(),
        });
        assert!(matches!(err, SessionError::StartFailed(_)));
        assert!(err.to_string().contains("401"));
    }
}
