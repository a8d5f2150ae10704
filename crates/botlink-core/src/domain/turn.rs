//! Raw turns as received from the bot transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a turn in the remote conversation stream.
///
/// Only [`TurnKind::Message`] turns can become chat messages; every other
/// kind is protocol traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnKind {
    Message,
    ConversationUpdate,
    Typing,
    Event,
    EndOfConversation,
    #[serde(other)]
    Other,
}

/// A structured payload attached to a turn (adaptive card, sign-in card,
/// file, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichAttachment {
    pub content_type: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One message or event unit from the remote conversation.
///
/// Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: String,
    pub kind: TurnKind,
    pub sender_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<RichAttachment>,
    /// Channel-specific metadata (carries the silent greeting marker).
    #[serde(default)]
    pub channel_data: Option<Value>,
}

impl Turn {
    /// Convenience constructor for a plain text message turn.
    #[must_use]
    pub fn message(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: TurnKind::Message,
            sender_id: sender_id.into(),
            text: Some(text.into()),
            timestamp: None,
            attachments: Vec::new(),
            channel_data: None,
        }
    }

    /// Attach a rich payload (builder style).
    #[must_use]
    pub fn with_attachment(mut self, attachment: RichAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Set the timestamp (builder style).
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Result of one poll: the new turns in transport order and the watermark to
/// use for the next poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnBatch {
    pub turns: Vec<Turn>,
    pub watermark: Option<String>,
}
