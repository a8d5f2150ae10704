//! Chat messages shown in the transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A sign-in prompt extracted from an OAuth or sign-in card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInCard {
    pub url: String,
}

/// A typed chat message.
///
/// Created by the mapper from one turn (or locally when the user sends), never
/// mutated afterwards, and appended to the transcript in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_from_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub speakable_text: Option<String>,
    #[serde(default)]
    pub rich_card: Option<Value>,
    #[serde(default)]
    pub sign_in_card: Option<SignInCard>,
}

impl ChatMessage {
    /// A message typed (or dictated) by the local user.
    ///
    /// Gets a locally generated id; the transport's echo of the same message
    /// is dropped by the mapper because it is authored by the local user.
    #[must_use]
    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            id: format!("local-{}", uuid::Uuid::new_v4()),
            text: text.into(),
            is_from_user: true,
            timestamp: Utc::now(),
            speakable_text: None,
            rich_card: None,
            sign_in_card: None,
        }
    }

    /// Plain bot text message (mostly useful in tests and fixtures).
    #[must_use]
    pub fn from_bot(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            is_from_user: false,
            timestamp: Utc::now(),
            speakable_text: None,
            rich_card: None,
            sign_in_card: None,
        }
    }

    /// The text that should be read aloud for this message.
    ///
    /// Prefers the explicit speakable text and falls back to the display text.
    #[must_use]
    pub fn speech_text(&self) -> &str {
        self.speakable_text.as_deref().unwrap_or(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_get_unique_local_ids() {
        let a = ChatMessage::from_user("hi");
        let b = ChatMessage::from_user("hi");
        assert!(a.is_from_user);
        assert!(a.id.starts_with("local-"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn speech_text_prefers_speakable() {
        let mut msg = ChatMessage::from_bot("1", "Display");
        assert_eq!(msg.speech_text(), "Display");
        msg.speakable_text = Some("Spoken".to_string());
        assert_eq!(msg.speech_text(), "Spoken");
    }
}
