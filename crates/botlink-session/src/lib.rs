#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod config;
mod error;
mod session;

pub use config::{DEFAULT_GREETING, SessionConfig};
pub use error::SessionError;
pub use session::{ConversationSession, SessionPorts};

/// Crate version, reported by hosts in diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
