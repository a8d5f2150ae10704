//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the conversation core expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No HTTP client types in any signature
//! - Transport errors carry the HTTP status only as a plain number
//! - Everything is `Send + Sync` so the session can share ports across tasks

pub mod event_emitter;
pub mod store;
pub mod transport;

pub use event_emitter::{ChannelEmitter, NoopEmitter, SessionEventEmitter};
pub use store::{KeyValueStore, MemoryStore, StoreError};
pub use transport::{ChatTransport, TransportError};
