//! Domain types for the conversation core.
//!
//! These types describe what flows between the bot transport, the
//! transcript and the speech layer, independent of any wire format.

pub mod attachment;
pub mod cursor;
pub mod message;
pub mod turn;

pub use attachment::{FileUpload, OutgoingAttachment, OutgoingMessage};
pub use cursor::ConversationCursor;
pub use message::{ChatMessage, SignInCard};
pub use turn::{RichAttachment, Turn, TurnBatch, TurnKind};
