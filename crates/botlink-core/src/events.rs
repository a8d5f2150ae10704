//! Session events emitted to the host.
//!
//! The host (widget shell, test harness, ...) receives these through a
//! [`SessionEventEmitter`](crate::ports::SessionEventEmitter) and redraws
//! or reacts as it sees fit. Events are notifications only; the transcript
//! itself is read back through the session.

use serde::{Deserialize, Serialize};

/// Lifecycle of a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected { conversation_id: String },
    /// Fatal-to-session error; no automatic retry.
    Failed { message: String },
    Closed,
}

/// Notifications emitted by the conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    StatusChanged(SessionStatus),

    /// The transcript grew (or was cleared).
    TranscriptChanged { len: usize },

    /// Interim recognition text in hands-free mode, for live display.
    LiveTranscript { text: String },

    /// Single-shot dictation result to place in the input field.
    InputFieldFilled { text: String },

    /// Waiting for the bot started (`true`) or ended (`false`).
    Thinking(bool),

    /// A user turn could not be delivered.
    SendFailed { message: String },

    /// A poll cycle failed; the loop keeps running.
    PollFailed { message: String },
}

impl SessionEvent {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged(_) => "status_changed",
            Self::TranscriptChanged { .. } => "transcript_changed",
            Self::LiveTranscript { .. } => "live_transcript",
            Self::InputFieldFilled { .. } => "input_field_filled",
            Self::Thinking(_) => "thinking",
            Self::SendFailed { .. } => "send_failed",
            Self::PollFailed { .. } => "poll_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(SessionEvent::TranscriptChanged { len: 3 }).unwrap();
        assert_eq!(json["type"], "transcriptChanged");
        assert_eq!(json["len"], 3);
    }

    #[test]
    fn status_serializes_with_status_tag() {
        let json = serde_json::to_value(SessionStatus::Connected {
            conversation_id: "c1".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "connected");
        assert_eq!(json["conversation_id"], "c1");
    }

    #[test]
    fn event_names() {
        assert_eq!(SessionEvent::Thinking(true).name(), "thinking");
        assert_eq!(
            SessionEvent::PollFailed {
                message: String::new()
            }
            .name(),
            "poll_failed"
        );
    }
}
