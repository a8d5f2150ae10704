//! Port trait implementation for `DirectLineClient`.
//!
//! Implements the core-owned `ChatTransport` trait and maps internal errors
//! onto the core `TransportError`.

use async_trait::async_trait;
use botlink_core::{ChatTransport, OutgoingMessage, TransportError, TurnBatch};

use crate::client::DirectLineClient;
use crate::error::DirectLineError;
use crate::http::HttpBackend;

/// Convert internal `DirectLineError` to core `TransportError`.
fn map_error(err: DirectLineError) -> TransportError {
    match err {
        DirectLineError::ApiRequestFailed { status, url } => TransportError::Rejected {
            status,
            message: url,
        },
        DirectLineError::MissingSecret => {
            TransportError::NotConfigured("Direct Line secret is missing".to_string())
        }
        DirectLineError::InvalidConfig { message } => TransportError::NotConfigured(message),
        DirectLineError::InvalidUrl(e) => TransportError::NotConfigured(e.to_string()),
        DirectLineError::InvalidResponse { message } => TransportError::InvalidResponse(message),
        DirectLineError::JsonParse(e) => TransportError::InvalidResponse(e.to_string()),
        DirectLineError::Network(e) => TransportError::Network(e.to_string()),
    }
}

#[async_trait]
impl<B: HttpBackend> ChatTransport for DirectLineClient<B> {
    fn user_id(&self) -> &str {
        Self::user_id(self)
    }

    async fn start_conversation(&self) -> Result<String, TransportError> {
        Self::start_conversation(self).await.map_err(map_error)
    }

    async fn reconnect_conversation(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<bool, TransportError> {
        Self::reconnect_conversation(self, conversation_id, watermark)
            .await
            .map_err(map_error)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        message: &OutgoingMessage,
    ) -> Result<(), TransportError> {
        Self::send_message(self, conversation_id, message)
            .await
            .map_err(map_error)
    }

    async fn fetch_turns(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<TurnBatch, TransportError> {
        Self::fetch_turns(self, conversation_id, watermark)
            .await
            .map_err(map_error)
    }

    async fn trigger_conversation_start(
        &self,
        conversation_id: &str,
    ) -> Result<(), TransportError> {
        Self::trigger_conversation_start(self, conversation_id)
            .await
            .map_err(map_error)
    }
}
