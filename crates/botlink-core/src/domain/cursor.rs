//! Conversation cursor.

use serde::{Deserialize, Serialize};

/// Identifies a remote conversation and the last-seen position in its turn
/// stream.
///
/// The watermark is opaque: it is only ever replaced by the value the
/// transport hands back, never computed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCursor {
    pub conversation_id: String,
    pub watermark: Option<String>,
}

impl ConversationCursor {
    /// Cursor for a freshly started conversation (nothing seen yet).
    #[must_use]
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            watermark: None,
        }
    }

    /// Advance to the watermark returned by the latest poll.
    ///
    /// A `None` from the transport leaves the current watermark in place so
    /// the cursor never moves backwards to "from the beginning".
    pub fn advance(&mut self, watermark: Option<String>) {
        if watermark.is_some() {
            self.watermark = watermark;
        }
    }
}
