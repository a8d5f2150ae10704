//! Outgoing messages and file attachments.

use serde::{Deserialize, Serialize};

/// A file picked by the user, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// An attachment ready to hand to the transport.
///
/// `content_url` is a `data:` URL carrying the base64-encoded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingAttachment {
    pub content_type: String,
    pub content_url: String,
    pub name: String,
}

/// A user turn to post to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    pub text: String,
    pub attachments: Vec<OutgoingAttachment>,
    /// Marks the hidden greeting sent during the start handshake. The
    /// transport tags it so it never shows up in the transcript.
    pub silent_greeting: bool,
}

impl OutgoingMessage {
    /// Plain text message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Text message with attachments.
    #[must_use]
    pub fn with_attachments(text: impl Into<String>, attachments: Vec<OutgoingAttachment>) -> Self {
        Self {
            text: text.into(),
            attachments,
            silent_greeting: false,
        }
    }

    /// Invisible greeting used to wake bots that do not greet proactively.
    #[must_use]
    pub fn silent_greeting(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
            silent_greeting: true,
        }
    }
}
