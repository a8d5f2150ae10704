//! Direct Line client.
//!
//! Generic over the HTTP backend so that tests can drive it with canned
//! responses. Production code uses [`DefaultDirectLineClient`].

use std::collections::HashMap;
use std::sync::Mutex;

use botlink_core::{OutgoingMessage, TurnBatch};
use serde_json::Value;
use url::Url;

use crate::config::DirectLineConfig;
use crate::error::{DirectLineError, DirectLineResult};
use crate::http::{ApiRequest, HttpBackend, ReqwestBackend};
use crate::wire::{
    ActivitySet, ChannelAccount, ConversationResponse, conversation_update_activity,
    message_activity,
};

/// Default Direct Line client using the reqwest backend.
pub type DefaultDirectLineClient = DirectLineClient<ReqwestBackend>;

/// Client for one Direct Line channel.
///
/// Holds the channel secret and the per-conversation tokens issued by the
/// service. Neither ever leaves the client.
pub struct DirectLineClient<B: HttpBackend> {
    pub(crate) backend: B,
    base_url: Url,
    secret: String,
    user: ChannelAccount,
    tokens: Mutex<HashMap<String, String>>,
}

impl DefaultDirectLineClient {
    /// Create a client, failing with `MissingSecret` if no secret is set.
    pub fn new(config: &DirectLineConfig) -> DirectLineResult<Self> {
        config.validate()?;
        let backend = ReqwestBackend::new(config)?;
        Self::with_backend(config, backend)
    }
}

impl<B: HttpBackend> DirectLineClient<B> {
    /// Create a client with a custom backend.
    pub fn with_backend(config: &DirectLineConfig, backend: B) -> DirectLineResult<Self> {
        config.validate()?;
        // Trailing slash so relative joins keep the `/v3/directline` prefix.
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');

        Ok(Self {
            backend,
            base_url: Url::parse(&base)?,
            secret: config.secret.clone(),
            user: ChannelAccount {
                id: config.user_id.clone(),
                name: Some(config.user_name.clone()),
            },
            tokens: Mutex::new(HashMap::new()),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    // ── URLs ────────────────────────────────────────────────────────

    fn conversations_url(&self) -> DirectLineResult<Url> {
        Ok(self.base_url.join("conversations")?)
    }

    fn conversation_url(&self, conversation_id: &str, watermark: Option<&str>) -> DirectLineResult<Url> {
        let mut url = self.base_url.join("conversations/")?;
        url.path_segments_mut()
            .map_err(|()| DirectLineError::InvalidConfig {
                message: "base URL cannot hold a path".to_string(),
            })?
            .pop_if_empty()
            .push(conversation_id);
        if let Some(watermark) = watermark {
            url.query_pairs_mut().append_pair("watermark", watermark);
        }
        Ok(url)
    }

    fn activities_url(&self, conversation_id: &str, watermark: Option<&str>) -> DirectLineResult<Url> {
        let mut url = self.conversation_url(conversation_id, None)?;
        url.path_segments_mut()
            .map_err(|()| DirectLineError::InvalidConfig {
                message: "base URL cannot hold a path".to_string(),
            })?
            .push("activities");
        if let Some(watermark) = watermark {
            url.query_pairs_mut().append_pair("watermark", watermark);
        }
        Ok(url)
    }

    // ── Credentials ─────────────────────────────────────────────────

    /// Token for the conversation, or the channel secret if none was issued.
    fn credential(&self, conversation_id: &str) -> String {
        self.tokens
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_else(|| self.secret.clone())
    }

    fn remember(&self, response: &ConversationResponse) {
        if let Some(ref token) = response.token {
            tracing::debug!(
                conversation_id = %response.conversation_id,
                expires_in = ?response.expires_in,
                "Stored conversation token"
            );
            self.tokens
                .lock()
                .unwrap()
                .insert(response.conversation_id.clone(), token.clone());
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> DirectLineResult<T> {
        serde_json::from_value(value).map_err(|e| DirectLineError::InvalidResponse {
            message: format!("{what}: {e}"),
        })
    }

    // ── Operations ──────────────────────────────────────────────────

    pub async fn start_conversation(&self) -> DirectLineResult<String> {
        let request = ApiRequest::post(self.conversations_url()?, self.secret.clone(), None);
        let response: ConversationResponse =
            Self::parse(self.backend.execute(&request).await?, "start conversation")?;
        self.remember(&response);
        tracing::info!(conversation_id = %response.conversation_id, "Direct Line conversation started");
        Ok(response.conversation_id)
    }

    /// Returns `Ok(false)` when the service reports the conversation as
    /// forbidden or not found.
    pub async fn reconnect_conversation(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> DirectLineResult<bool> {
        let request = ApiRequest::get(
            self.conversation_url(conversation_id, watermark)?,
            self.secret.clone(),
        );
        match self.backend.execute(&request).await {
            Ok(value) => {
                let response: ConversationResponse = Self::parse(value, "reconnect")?;
                self.remember(&response);
                tracing::info!(%conversation_id, "Direct Line conversation resumed");
                Ok(true)
            }
            Err(DirectLineError::ApiRequestFailed {
                status: 403 | 404, ..
            }) => {
                tracing::info!(%conversation_id, "Stored conversation expired");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn send_message(
        &self,
        conversation_id: &str,
        message: &OutgoingMessage,
    ) -> DirectLineResult<()> {
        let request = ApiRequest::post(
            self.activities_url(conversation_id, None)?,
            self.credential(conversation_id),
            Some(message_activity(message, &self.user)),
        );
        self.backend.execute(&request).await?;
        tracing::debug!(
            %conversation_id,
            attachments = message.attachments.len(),
            silent = message.silent_greeting,
            "Posted user activity"
        );
        Ok(())
    }

    pub async fn fetch_turns(
        &self,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> DirectLineResult<TurnBatch> {
        let request = ApiRequest::get(
            self.activities_url(conversation_id, watermark)?,
            self.credential(conversation_id),
        );
        let set: ActivitySet = Self::parse(self.backend.execute(&request).await?, "activity set")?;
        Ok(set.into_batch())
    }

    pub async fn trigger_conversation_start(&self, conversation_id: &str) -> DirectLineResult<()> {
        let request = ApiRequest::post(
            self.activities_url(conversation_id, None)?,
            self.credential(conversation_id),
            Some(conversation_update_activity(&self.user)),
        );
        self.backend.execute(&request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::http::testing::{CannedResponse, FakeBackend};
    use serde_json::json;

    fn config() -> DirectLineConfig {
        DirectLineConfig::new("secret").with_user_id("u1")
    }

    fn client(backend: FakeBackend) -> DirectLineClient<FakeBackend> {
        DirectLineClient::with_backend(&config(), backend).unwrap()
    }

    #[test]
    fn test_default_client_creation() {
        let _client = tokio_test::assert_ok!(DefaultDirectLineClient::new(&config()));
    }

    #[test]
    fn test_missing_secret() {
        let result = DefaultDirectLineClient::new(&DirectLineConfig::new(""));
        assert!(matches!(result, Err(DirectLineError::MissingSecret)));
    }

    #[test]
    fn test_urls_keep_base_path() {
        let client = client(FakeBackend::new());
        assert_eq!(
            client.conversations_url().unwrap().as_str(),
            "https://directline.botframework.com/v3/directline/conversations"
        );
        assert_eq!(
            client.activities_url("abc-1", Some("7")).unwrap().as_str(),
            "https://directline.botframework.com/v3/directline/conversations/abc-1/activities?watermark=7"
        );
        assert_eq!(
            client.conversation_url("abc", None).unwrap().as_str(),
            "https://directline.botframework.com/v3/directline/conversations/abc"
        );
    }

    #[tokio::test]
    async fn test_start_uses_secret_then_token() {
        let backend = FakeBackend::new()
            .with_response(
                Method::Post,
                "/conversations/c1/activities",
                CannedResponse::Json(json!({"id": "c1|0001"})),
            )
            .with_response(
                Method::Post,
                "/conversations",
                CannedResponse::Json(json!({"conversationId": "c1", "token": "tok-1"})),
            );
        let client = client(backend);

        let id = client.start_conversation().await.unwrap();
        assert_eq!(id, "c1");

        client
            .send_message("c1", &OutgoingMessage::text("hi"))
            .await
            .unwrap();

        let requests = client.backend.requests();
        assert_eq!(requests[0].bearer, "secret");
        assert_eq!(requests[1].bearer, "tok-1");
        assert_eq!(requests[1].body.as_ref().unwrap()["text"], "hi");
    }

    #[tokio::test]
    async fn test_start_rejected() {
        let backend =
            FakeBackend::new().with_response(Method::Post, "/conversations", CannedResponse::Status(403));
        let err = client(backend).start_conversation().await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_reconnect_expired_returns_false() {
        for status in [403, 404] {
            let backend = FakeBackend::new().with_response(
                Method::Get,
                "/conversations/old",
                CannedResponse::Status(status),
            );
            let valid = client(backend)
                .reconnect_conversation("old", Some("4"))
                .await
                .unwrap();
            assert!(!valid);
        }
    }

    #[tokio::test]
    async fn test_reconnect_other_failure_is_error() {
        let backend = FakeBackend::new().with_response(
            Method::Get,
            "/conversations/c1",
            CannedResponse::Status(500),
        );
        let err = client(backend)
            .reconnect_conversation("c1", None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_reconnect_valid_passes_watermark() {
        let backend = FakeBackend::new().with_response(
            Method::Get,
            "/conversations/c1",
            CannedResponse::Json(json!({"conversationId": "c1", "token": "fresh"})),
        );
        let client = client(backend);
        assert!(tokio_test::assert_ok!(
            client.reconnect_conversation("c1", Some("12")).await
        ));

        let requests = client.backend.requests();
        assert!(requests[0].url.as_str().ends_with("/conversations/c1?watermark=12"));
        assert_eq!(client.credential("c1"), "fresh");
    }

    #[tokio::test]
    async fn test_fetch_turns_passes_watermark() {
        let backend = FakeBackend::new().with_response(
            Method::Get,
            "/activities",
            CannedResponse::Json(json!({
                "activities": [{"type": "message", "id": "c1|5", "from": {"id": "bot"}, "text": "Hello"}],
                "watermark": "5"
            })),
        );
        let client = client(backend);

        let batch = client.fetch_turns("c1", Some("4")).await.unwrap();
        assert_eq!(batch.turns.len(), 1);
        assert_eq!(batch.watermark.as_deref(), Some("5"));
        assert!(
            client.backend.requests()[0]
                .url
                .as_str()
                .ends_with("/activities?watermark=4")
        );
    }

    #[tokio::test]
    async fn test_trigger_sends_conversation_update() {
        let backend = FakeBackend::new().with_response(
            Method::Post,
            "/activities",
            CannedResponse::Json(json!({"id": "c1|1"})),
        );
        let client = client(backend);
        client.trigger_conversation_start("c1").await.unwrap();

        let body = client.backend.requests()[0].body.clone().unwrap();
        assert_eq!(body["type"], "conversationUpdate");
        assert_eq!(body["from"]["id"], "u1");
    }
}
