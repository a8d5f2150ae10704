#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod attachments;
pub mod domain;
pub mod events;
pub mod mapper;
pub mod ports;
pub mod services;
pub mod settings;

// Re-export commonly used types for convenience
pub use attachments::{
    AttachmentPolicy, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_FILES, PreparedAttachments,
    RejectedFile, RejectionReason, prepare_attachments,
};
pub use domain::{
    ChatMessage, ConversationCursor, FileUpload, OutgoingAttachment, OutgoingMessage,
    RichAttachment, SignInCard, Turn, TurnBatch, TurnKind,
};
pub use events::{SessionEvent, SessionStatus};
pub use mapper::{SILENT_GREETING_MARKER, TurnDeduplicator, is_silent_greeting, map_turn};
pub use ports::{
    ChannelEmitter, ChatTransport, KeyValueStore, MemoryStore, NoopEmitter, SessionEventEmitter,
    StoreError, TransportError,
};
pub use services::{SessionStore, SessionStoreError};
pub use settings::{
    DEFAULT_VOICE, SettingsError, VoiceProfile, WidgetSettings, WidgetSettingsUpdate,
    validate_settings,
};
