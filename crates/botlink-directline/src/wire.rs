//! Direct Line wire types.
//!
//! These mirror the JSON exchanged with the service and are converted to
//! and from core domain types here, so nothing outside this crate sees the
//! wire format.

use botlink_core::{OutgoingMessage, RichAttachment, SILENT_GREETING_MARKER, Turn, TurnBatch, TurnKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Response to starting or reconnecting a conversation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub conversation_id: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAttachment {
    pub content_type: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// An activity received from the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<WireAttachment>,
    #[serde(default)]
    pub channel_data: Option<Value>,
}

/// Page of activities returned by a poll.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivitySet {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub watermark: Option<String>,
}

fn turn_kind(kind: &str) -> TurnKind {
    match kind {
        "message" => TurnKind::Message,
        "conversationUpdate" => TurnKind::ConversationUpdate,
        "typing" => TurnKind::Typing,
        "event" => TurnKind::Event,
        "endOfConversation" => TurnKind::EndOfConversation,
        _ => TurnKind::Other,
    }
}

impl Activity {
    /// Convert to a core turn. Activities without an id cannot be
    /// deduplicated and are dropped.
    pub fn into_turn(self) -> Option<Turn> {
        let id = self.id?;
        Some(Turn {
            id,
            kind: turn_kind(&self.kind),
            sender_id: self.from.map(|f| f.id).unwrap_or_default(),
            text: self.text,
            timestamp: self.timestamp,
            attachments: self
                .attachments
                .into_iter()
                .map(|a| RichAttachment {
                    content_type: a.content_type,
                    content: a.content,
                    content_url: a.content_url,
                    name: a.name,
                })
                .collect(),
            channel_data: self.channel_data,
        })
    }
}

impl ActivitySet {
    pub fn into_batch(self) -> TurnBatch {
        let total = self.activities.len();
        let turns: Vec<Turn> = self
            .activities
            .into_iter()
            .filter_map(Activity::into_turn)
            .collect();
        if turns.len() < total {
            tracing::debug!(dropped = total - turns.len(), "Dropped activities without id");
        }
        TurnBatch {
            turns,
            watermark: self.watermark,
        }
    }
}

/// Body for posting a user message.
pub fn message_activity(message: &OutgoingMessage, from: &ChannelAccount) -> Value {
    let mut activity = json!({
        "type": "message",
        "from": from,
        "text": message.text,
    });
    if !message.attachments.is_empty() {
        activity["attachments"] = json!(message.attachments);
    }
    if message.silent_greeting {
        activity["channelData"] = json!({ SILENT_GREETING_MARKER: true });
    }
    activity
}

/// Body for the conversation-start wake signal.
pub fn conversation_update_activity(from: &ChannelAccount) -> Value {
    json!({
        "type": "conversationUpdate",
        "from": from,
        "membersAdded": [from],
    })
}
