// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for chatline
//!
//! Failures are tagged with an [`ErrorKind`] where they happen (the HTTP
//! backend, the socket transport, the queue) so that retry decisions and
//! user-facing messages never depend on parsing error text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification shared by the completion and realtime channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An attempt exceeded its deadline
    Timeout,
    /// Network unreachable, connection refused, or a server-side failure
    TransportFailure,
    /// The server signaled throttling
    RateLimited,
    /// Bad credentials; never retried
    AuthInvalid,
    /// Well-formed response with an unusable payload
    InvalidResponse,
    /// Oldest queued realtime message was dropped (informational)
    QueueOverflow,
    /// Reconnection gave up after the configured number of attempts
    ReconnectExhausted,
}

impl ErrorKind {
    /// Whether a completion attempt failing with this kind may be retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::TransportFailure
                | ErrorKind::RateLimited
                | ErrorKind::InvalidResponse
        )
    }

    /// Human-readable message shown to the user for this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "The request timed out. Please retry or try another model.",
            ErrorKind::TransportFailure => {
                "Network connection failed. Please check your connection and retry."
            }
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and retry.",
            ErrorKind::AuthInvalid => "The API key is invalid. Please check your configuration.",
            ErrorKind::InvalidResponse => "The AI service returned an unusable response.",
            ErrorKind::QueueOverflow => "A pending message was dropped while offline.",
            ErrorKind::ReconnectExhausted => {
                "Lost connection to the chat server. Reconnect to continue."
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::AuthInvalid => "auth_invalid",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::QueueOverflow => "queue_overflow",
            ErrorKind::ReconnectExhausted => "reconnect_exhausted",
        };
        f.write_str(name)
    }
}

/// Main error type for chatline operations
#[derive(Error, Debug)]
pub enum ChatError {
    /// A single failed API attempt
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Terminal completion failure after retries
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    /// Realtime session errors
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of one completion attempt, tagged at the point of failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Deadline elapsed before a response arrived
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Connection-level failure or non-2xx server status
    #[error("Transport failure: {message}")]
    TransportFailure {
        status: Option<u16>,
        message: String,
    },

    /// Rate limited by the API
    #[error("Rate limited (retry after {0:?} seconds)")]
    RateLimited(Option<u64>),

    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthInvalid,

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::TransportFailure { .. } => ErrorKind::TransportFailure,
            ApiError::RateLimited(_) => ErrorKind::RateLimited,
            ApiError::AuthInvalid => ErrorKind::AuthInvalid,
            ApiError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }

    /// Shorthand for a connection failure with no HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::TransportFailure {
            status: None,
            message: message.into(),
        }
    }
}

/// The one error a caller of `complete()` ever sees
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CompletionError {
    /// Classification of the final failure
    pub kind: ErrorKind,
    /// User-presentable message derived from `kind`
    pub message: String,
    /// Technical description of the last attempt's failure
    pub detail: String,
    /// Number of attempts made before giving up
    pub attempts: u32,
}

impl CompletionError {
    /// Build the terminal error from the last attempt's failure.
    pub fn from_api(error: &ApiError, attempts: u32) -> Self {
        let kind = error.kind();
        Self {
            kind,
            message: kind.user_message().to_string(),
            detail: error.to_string(),
            attempts,
        }
    }
}

/// Result type alias for chatline operations
pub type Result<T> = std::result::Result<T, ChatError>;
