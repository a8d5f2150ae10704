//! HTTP backend abstraction for the Direct Line API.
//!
//! The client talks to a trait-based backend so it can be driven by canned
//! responses in tests. The production implementation uses reqwest with
//! automatic retry for transient errors.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::DirectLineConfig;
use crate::error::{DirectLineError, DirectLineResult};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One authenticated API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    /// Secret or conversation token sent as the bearer credential.
    pub bearer: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub const fn get(url: Url, bearer: String) -> Self {
        Self {
            method: Method::Get,
            url,
            bearer,
            body: None,
        }
    }

    pub const fn post(url: Url, bearer: String, body: Option<Value>) -> Self {
        Self {
            method: Method::Post,
            url,
            bearer,
            body,
        }
    }
}

// ============================================================================
// HTTP Backend Trait
// ============================================================================

/// Executes API calls and returns the decoded JSON body.
///
/// An empty response body decodes to `Value::Null`.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> DirectLineResult<Value>;
}

// ============================================================================
// Reqwest Backend
// ============================================================================

/// Production HTTP backend using reqwest with retry logic.
///
/// Retries server errors (5xx) and network errors with exponential backoff.
/// Client errors (4xx) fail on the first attempt.
pub struct ReqwestBackend {
    client: reqwest::Client,
    max_retries: u8,
    retry_base_delay: Duration,
}

impl ReqwestBackend {
    pub fn new(config: &DirectLineConfig) -> DirectLineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
        })
    }

    fn build_request(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let builder = match request.method {
            Method::Get => self.client.get(request.url.as_str()),
            Method::Post => self.client.post(request.url.as_str()),
        };
        let builder = builder.bearer_auth(&request.bearer);
        match request.body {
            Some(ref body) => builder.json(body),
            None => builder,
        }
    }

    async fn send_with_retry(&self, request: &ApiRequest) -> DirectLineResult<reqwest::Response> {
        let mut last_error: Option<DirectLineError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base_delay * 2u32.pow(u32::from(attempt) - 1);
                tracing::debug!(attempt, ?delay, url = %request.url, "Retrying Direct Line request");
                tokio::time::sleep(delay).await;
            }

            match self.build_request(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = DirectLineError::ApiRequestFailed {
                        status: status.as_u16(),
                        url: request.url.to_string(),
                    };
                    if status.is_server_error() && attempt < self.max_retries {
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        last_error = Some(e.into());
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DirectLineError::InvalidResponse {
            message: "Unknown error during request".to_string(),
        }))
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: &ApiRequest) -> DirectLineResult<Value> {
        let response = self.send_with_retry(request).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

// ============================================================================
// Fake Backend for Testing
// ============================================================================
