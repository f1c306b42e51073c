// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use chatline::error::{ApiError, ChatError, CompletionError, ErrorKind};
use std::io;

#[test]
fn test_io_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let error: ChatError = io_error.into();

    match error {
        ChatError::Io(_) => {}
        _ => panic!("Expected Io error, got different error type"),
    }
}

#[test]
fn test_config_error_display() {
    let error = ChatError::Config("Missing API key".to_string());
    assert_eq!(error.to_string(), "Configuration error: Missing API key");
}

#[test]
fn test_realtime_error_display() {
    let error = ChatError::Realtime("frame has no type".to_string());
    assert_eq!(error.to_string(), "Realtime error: frame has no type");
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: ChatError = json_error.into();
    assert!(matches!(error, ChatError::Json(_)));
}

#[test]
fn test_api_error_display() {
    assert_eq!(
        ApiError::Timeout(20_000).to_string(),
        "Request timed out after 20000 ms"
    );
    assert_eq!(
        ApiError::AuthInvalid.to_string(),
        "Authentication failed: invalid API key"
    );
    assert!(ApiError::RateLimited(Some(30)).to_string().contains("30"));
}

#[test]
fn test_only_auth_and_session_kinds_are_terminal() {
    let retryable: Vec<ErrorKind> = [
        ErrorKind::Timeout,
        ErrorKind::TransportFailure,
        ErrorKind::RateLimited,
        ErrorKind::AuthInvalid,
        ErrorKind::InvalidResponse,
        ErrorKind::QueueOverflow,
        ErrorKind::ReconnectExhausted,
    ]
    .into_iter()
    .filter(|k| k.is_retryable())
    .collect();

    assert_eq!(
        retryable,
        vec![
            ErrorKind::Timeout,
            ErrorKind::TransportFailure,
            ErrorKind::RateLimited,
            ErrorKind::InvalidResponse
        ]
    );
}

#[test]
fn test_completion_error_message_is_classified() {
    let err = CompletionError::from_api(&ApiError::RateLimited(None), 3);
    assert_eq!(err.kind, ErrorKind::RateLimited);
    assert_eq!(err.to_string(), ErrorKind::RateLimited.user_message());

    let wrapped: ChatError = err.into();
    assert!(wrapped.to_string().starts_with("Completion failed"));
}

#[test]
fn test_error_kind_serializes_snake_case() {
    let value = serde_json::to_value(ErrorKind::ReconnectExhausted).unwrap();
    assert_eq!(value, "reconnect_exhausted");
}
