//! Turn deduplication and `Turn -> ChatMessage` mapping.
//!
//! The deduplicator guarantees that no turn id ever produces more than one
//! chat message, no matter how many poll cycles observe it. The mapper is a
//! pure function that decides whether a turn is visible content and, if so,
//! extracts display text, speakable text and rich-card payloads.
//!
//! # Card extraction policy
//!
//! - OAuth / sign-in cards become a sign-in prompt; the first button's
//!   `value` is the sign-in URL.
//! - Adaptive cards (and hero/thumbnail cards) become a card message. The
//!   speakable text comes from the card's `speak` field, else from the body
//!   text elements joined with `". "`. When the turn has no text of its own,
//!   the display text is backfilled from the body joined with single spaces.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::Value;

use crate::domain::{ChatMessage, RichAttachment, SignInCard, Turn, TurnKind};

/// Channel-data key that marks the hidden handshake greeting.
pub const SILENT_GREETING_MARKER: &str = "silentGreeting";

const OAUTH_CARD: &str = "application/vnd.microsoft.card.oauth";
const SIGNIN_CARD: &str = "application/vnd.microsoft.card.signin";
const ADAPTIVE_CARD: &str = "application/vnd.microsoft.card.adaptive";
const HERO_CARD: &str = "application/vnd.microsoft.card.hero";
const THUMBNAIL_CARD: &str = "application/vnd.microsoft.card.thumbnail";

// ── Deduplicator ───────────────────────────────────────────────────

/// Set of turn ids already materialised into chat messages.
///
/// Grows for the lifetime of a conversation; cleared only when the user
/// explicitly starts a new one.
#[derive(Debug, Clone, Default)]
pub struct TurnDeduplicator {
    seen: HashSet<String>,
}

impl TurnDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `turn_id` and report whether it is new.
    ///
    /// Returns `false` for an id that was admitted before.
    pub fn admit(&mut self, turn_id: &str) -> bool {
        self.seen.insert(turn_id.to_string())
    }

    /// Mark ids as already seen without mapping them (used when a transcript
    /// snapshot is restored on resume).
    pub fn seed<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seen.extend(ids.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn contains(&self, turn_id: &str) -> bool {
        self.seen.contains(turn_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Filter a poll batch down to the turns not seen before, preserving
    /// transport order, and map each one.
    ///
    /// Every new turn id is recorded even when the mapper drops the turn, so
    /// protocol traffic is never reconsidered either.
    pub fn map_new(&mut self, turns: &[Turn], local_user_id: &str) -> Vec<ChatMessage> {
        turns
            .iter()
            .filter(|turn| self.admit(&turn.id))
            .filter_map(|turn| map_turn(turn, local_user_id))
            .collect()
    }
}

// ── Mapper ─────────────────────────────────────────────────────────

/// Map one raw turn to a chat message, or `None` if it is not visible content.
///
/// Dropped unconditionally: turns authored by `local_user_id`, non-message
/// turns, and turns carrying the silent greeting marker. Dropped after
/// extraction: turns with no text, no sign-in prompt and no card.
#[must_use]
pub fn map_turn(turn: &Turn, local_user_id: &str) -> Option<ChatMessage> {
    if turn.kind != TurnKind::Message
        || turn.sender_id == local_user_id
        || is_silent_greeting(turn)
    {
        return None;
    }

    let own_text = turn
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string);

    let mut sign_in_card: Option<SignInCard> = None;
    let mut sign_in_text: Option<String> = None;
    let mut card: Option<CardExtract> = None;

    for attachment in &turn.attachments {
        match classify(attachment) {
            AttachmentClass::SignIn if sign_in_card.is_none() => {
                if let Some(content) = &attachment.content {
                    sign_in_card = first_button_value(content).map(|url| SignInCard { url });
                    sign_in_text = string_field(content, "text");
                }
            }
            AttachmentClass::Card if card.is_none() => {
                if let Some(content) = &attachment.content {
                    card = Some(extract_card(content));
                }
            }
            _ => {}
        }
    }

    if own_text.is_none() && sign_in_card.is_none() && card.is_none() {
        return None;
    }

    let (text, speakable_text, rich_card) = match card {
        Some(extract) => {
            let speakable = extract.speak.or_else(|| {
                (!extract.body_texts.is_empty()).then(|| extract.body_texts.join(". "))
            });
            let text = own_text
                .clone()
                .unwrap_or_else(|| extract.body_texts.join(" "));
            (text, speakable, Some(extract.payload))
        }
        None => (
            own_text.or(sign_in_text).unwrap_or_default(),
            None,
            None,
        ),
    };

    Some(ChatMessage {
        id: turn.id.clone(),
        text,
        is_from_user: false,
        timestamp: turn.timestamp.unwrap_or_else(Utc::now),
        speakable_text,
        rich_card,
        sign_in_card,
    })
}

/// Whether the turn carries the hidden-greeting marker in its channel data.
#[must_use]
pub fn is_silent_greeting(turn: &Turn) -> bool {
    turn.channel_data
        .as_ref()
        .and_then(|data| data.get(SILENT_GREETING_MARKER))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

// ── Internal helpers ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachmentClass {
    SignIn,
    Card,
    Other,
}

fn classify(attachment: &RichAttachment) -> AttachmentClass {
    match attachment.content_type.to_ascii_lowercase().as_str() {
        OAUTH_CARD | SIGNIN_CARD => AttachmentClass::SignIn,
        ADAPTIVE_CARD | HERO_CARD | THUMBNAIL_CARD => AttachmentClass::Card,
        _ => AttachmentClass::Other,
    }
}

struct CardExtract {
    payload: Value,
    speak: Option<String>,
    body_texts: Vec<String>,
}

fn extract_card(content: &Value) -> CardExtract {
    let mut body_texts = Vec::new();

    if let Some(body) = content.get("body").and_then(Value::as_array) {
        collect_text_blocks(body, &mut body_texts);
    } else {
        // Hero / thumbnail cards keep their text in flat fields.
        for key in ["title", "subtitle", "text"] {
            if let Some(text) = string_field(content, key) {
                body_texts.push(text);
            }
        }
    }

    CardExtract {
        payload: content.clone(),
        speak: string_field(content, "speak"),
        body_texts,
    }
}

/// Walk adaptive-card elements depth-first collecting `TextBlock` text.
///
/// Descends into containers (`items`), column sets (`columns`) and columns.
fn collect_text_blocks(elements: &[Value], out: &mut Vec<String>) {
    for element in elements {
        if element.get("type").and_then(Value::as_str) == Some("TextBlock") {
            if let Some(text) = string_field(element, "text") {
                out.push(text);
            }
        }
        for key in ["items", "columns"] {
            if let Some(children) = element.get(key).and_then(Value::as_array) {
                collect_text_blocks(children, out);
            }
        }
    }
}

fn first_button_value(content: &Value) -> Option<String> {
    content
        .get("buttons")
        .and_then(Value::as_array)
        .and_then(|buttons| buttons.first())
        .and_then(|button| string_field(button, "value"))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
