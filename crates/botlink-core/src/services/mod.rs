//! Services that orchestrate ports.

mod session_store;

pub use session_store::{
    CURSOR_EXPIRY_MINUTES, CURSOR_KEY, SETTINGS_KEY, SessionStore, SessionStoreError,
    TRANSCRIPT_KEY, TRANSCRIPT_SNAPSHOT_LIMIT,
};
