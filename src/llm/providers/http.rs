// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible HTTP backend
//!
//! Sends `POST {base_url}/chat/completions` with a bearer key and maps
//! every failure to a typed [`ApiError`] on the spot.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::common::{classify_reqwest_error, parse_retry_after_seconds};
use crate::config::ApiConfig;
use crate::error::{ApiError, ChatError, Result};
use crate::llm::backend::CompletionBackend;
use crate::llm::message::{ChatReply, ChatRequest, Usage};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-based completion backend
pub struct HttpBackend {
    client: Client,
    api_key: String,
    base_url: String,
    connect_timeout: Duration,
}

impl HttpBackend {
    /// Create a backend for the given base URL
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// Create from settings; the key must already be resolved.
    pub fn from_config(config: &ApiConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| {
            ChatError::Config(format!(
                "no API key configured (set {} or api.api_key)",
                config.api_key_env
            ))
        })?;
        Self::new(api_key, config.base_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Map a non-2xx response to its error kind
    fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
        let detail = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let code = detail
            .as_ref()
            .and_then(|d| d.error.as_ref())
            .and_then(|e| e.code.clone().or_else(|| e.r#type.clone()))
            .unwrap_or_default();
        let message = detail
            .as_ref()
            .and_then(|d| {
                d.error
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .or_else(|| d.message.clone())
            })
            .unwrap_or_else(|| format!("request failed ({status})"));

        if status == 401 || status == 403 || code == "invalid_api_key" {
            return ApiError::AuthInvalid;
        }
        if status == 429 || code.contains("rate_limit") {
            return ApiError::RateLimited(retry_after);
        }
        ApiError::TransportFailure {
            status: Some(status),
            message,
        }
    }

    /// Validate that the body carries usable content
    fn parse_reply(body: &str) -> std::result::Result<ChatReply, ApiError> {
        let response: ApiResponse = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("malformed body: {e}")))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                ApiError::InvalidResponse("missing choices[0].message.content".to_string())
            })?;

        Ok(ChatReply {
            text,
            usage: response.usage,
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &ChatRequest) -> std::result::Result<ChatReply, ApiError> {
        let timeout_ms = self.connect_timeout.as_millis() as u64;

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &body, retry_after));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e, timeout_ms))?;
        Self::parse_reply(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    r#type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = HttpBackend::new("key", "https://api.example.com/v1/").unwrap();
        assert_eq!(
            backend.endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(backend.name(), "http");
    }

    #[test]
    fn test_from_config_requires_key() {
        let err = HttpBackend::from_config(&ApiConfig::default(), None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("CHATLINE_API_KEY"));
    }

    #[test]
    fn test_parse_reply_ok() {
        let body = r#"{"choices":[{"message":{"content":"hello"}}],
                      "usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#;
        let reply = HttpBackend::parse_reply(body).unwrap();
        assert_eq!(reply.text, "hello");
        assert_eq!(reply.usage.unwrap().total_tokens, 5);
    }

    #[test]
    fn test_parse_reply_missing_content() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{}}]}"#,
            r#"{"choices":[{"message":{"content":""}}]}"#,
            r#"{}"#,
            "not json",
        ] {
            let err = HttpBackend::parse_reply(body).unwrap_err();
            assert!(matches!(err, ApiError::InvalidResponse(_)), "{body}");
        }
    }

    #[test]
    fn test_parse_error_auth() {
        assert_eq!(
            HttpBackend::parse_error(401, "", None),
            ApiError::AuthInvalid
        );
        let body = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        assert_eq!(
            HttpBackend::parse_error(400, body, None),
            ApiError::AuthInvalid
        );
    }

    #[test]
    fn test_parse_error_rate_limited() {
        assert_eq!(
            HttpBackend::parse_error(429, "", Some(7)),
            ApiError::RateLimited(Some(7))
        );
        let body = r#"{"error":{"message":"slow down","type":"rate_limit_exceeded"}}"#;
        assert_eq!(
            HttpBackend::parse_error(400, body, None),
            ApiError::RateLimited(None)
        );
    }

    #[test]
    fn test_parse_error_server_failure_keeps_message() {
        let body = r#"{"message":"upstream exploded"}"#;
        match HttpBackend::parse_error(503, body, None) {
            ApiError::TransportFailure { status, message } => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
