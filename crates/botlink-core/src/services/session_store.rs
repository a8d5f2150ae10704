//! Session persistence service.
//!
//! Stores widget settings, the conversation cursor and a transcript snapshot
//! through a [`KeyValueStore`]. Unreadable blobs are treated as absent so a
//! corrupt entry never blocks the widget from starting.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ChatMessage, ConversationCursor};
use crate::ports::{KeyValueStore, StoreError};
use crate::settings::{SettingsError, WidgetSettings, WidgetSettingsUpdate, validate_settings};

pub const SETTINGS_KEY: &str = "botlink.settings";
pub const CURSOR_KEY: &str = "botlink.cursor";
pub const TRANSCRIPT_KEY: &str = "botlink.transcript";

/// Stored cursors older than this many minutes are discarded on load.
pub const CURSOR_EXPIRY_MINUTES: i64 = 30;

/// Maximum number of messages kept in the transcript snapshot.
pub const TRANSCRIPT_SNAPSHOT_LIMIT: usize = 100;

/// Errors from the session store service.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCursor {
    cursor: ConversationCursor,
    saved_at: DateTime<Utc>,
}

/// Persistence for settings, cursor and transcript snapshot.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    snapshot_limit: usize,
    cursor_expiry: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            snapshot_limit: TRANSCRIPT_SNAPSHOT_LIMIT,
            cursor_expiry: Duration::minutes(CURSOR_EXPIRY_MINUTES),
        }
    }

    /// Keep at most `limit` messages in the transcript snapshot.
    #[must_use]
    pub fn with_snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    /// Discard stored cursors older than `expiry`.
    #[must_use]
    pub fn with_cursor_expiry(mut self, expiry: std::time::Duration) -> Self {
        self.cursor_expiry =
            Duration::from_std(expiry).unwrap_or_else(|_| Duration::minutes(CURSOR_EXPIRY_MINUTES));
        self
    }

    // ── Settings ────────────────────────────────────────────────────

    /// Load settings, falling back to defaults when absent or unreadable.
    pub async fn load_settings(&self) -> Result<WidgetSettings, SessionStoreError> {
        let Some(raw) = self.store.get(SETTINGS_KEY).await? else {
            return Ok(WidgetSettings::default());
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(error = %e, "Stored settings unreadable, using defaults");
                Ok(WidgetSettings::default())
            }
        }
    }

    /// Validate and save complete settings.
    pub async fn save_settings(&self, settings: &WidgetSettings) -> Result<(), SessionStoreError> {
        validate_settings(settings)?;
        let raw = serde_json::to_string(settings).map_err(StoreError::from)?;
        self.store.set(SETTINGS_KEY, raw).await?;
        Ok(())
    }

    /// Merge a partial update into the stored settings and save the result.
    pub async fn update_settings(
        &self,
        update: &WidgetSettingsUpdate,
    ) -> Result<WidgetSettings, SessionStoreError> {
        let mut current = self.load_settings().await?;
        current.merge(update);
        self.save_settings(&current).await?;
        Ok(current)
    }

    // ── Cursor ──────────────────────────────────────────────────────

    pub async fn save_cursor(&self, cursor: &ConversationCursor) -> Result<(), SessionStoreError> {
        self.save_cursor_at(cursor, Utc::now()).await
    }

    /// Save the cursor stamped with an explicit time.
    pub async fn save_cursor_at(
        &self,
        cursor: &ConversationCursor,
        saved_at: DateTime<Utc>,
    ) -> Result<(), SessionStoreError> {
        let stored = StoredCursor {
            cursor: cursor.clone(),
            saved_at,
        };
        let raw = serde_json::to_string(&stored).map_err(StoreError::from)?;
        self.store.set(CURSOR_KEY, raw).await?;
        Ok(())
    }

    /// Load a resumable cursor, if one was saved within the expiry window.
    pub async fn load_cursor(&self) -> Result<Option<ConversationCursor>, SessionStoreError> {
        self.load_cursor_at(Utc::now()).await
    }

    /// Load a resumable cursor as seen from `now`.
    pub async fn load_cursor_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationCursor>, SessionStoreError> {
        let Some(raw) = self.store.get(CURSOR_KEY).await? else {
            return Ok(None);
        };
        let stored: StoredCursor = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Stored cursor unreadable, ignoring");
                return Ok(None);
            }
        };
        if now - stored.saved_at > self.cursor_expiry {
            tracing::debug!(
                conversation_id = %stored.cursor.conversation_id,
                "Stored cursor expired"
            );
            return Ok(None);
        }
        Ok(Some(stored.cursor))
    }

    /// Forget the stored cursor and the transcript snapshot.
    pub async fn clear_cursor(&self) -> Result<(), SessionStoreError> {
        self.store.remove(CURSOR_KEY).await?;
        self.store.remove(TRANSCRIPT_KEY).await?;
        Ok(())
    }

    // ── Transcript snapshot ─────────────────────────────────────────

    /// Save the tail of the transcript.
    pub async fn save_transcript(&self, messages: &[ChatMessage]) -> Result<(), SessionStoreError> {
        let start = messages.len().saturating_sub(self.snapshot_limit);
        let raw = serde_json::to_string(&messages[start..]).map_err(StoreError::from)?;
        self.store.set(TRANSCRIPT_KEY, raw).await?;
        Ok(())
    }

    /// Load the transcript snapshot (empty when absent or unreadable).
    pub async fn load_transcript(&self) -> Result<Vec<ChatMessage>, SessionStoreError> {
        let Some(raw) = self.store.get(TRANSCRIPT_KEY).await? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stored transcript unreadable, ignoring");
            Vec::new()
        }))
    }
}
