#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]
// DirectLineClient<B> is meant to be used through the ChatTransport port,
// not its internal generic structure
#![allow(private_interfaces)]

mod client;
mod config;
mod error;
mod http;
mod port;
mod wire;

// ============================================================================
// Public API
// ============================================================================

// Client
pub use client::{DefaultDirectLineClient, DirectLineClient};

// Configuration
pub use config::DirectLineConfig;

// Errors
pub use error::{DirectLineError, DirectLineResult};

// Backend seam
pub use http::{ApiRequest, HttpBackend, Method};

