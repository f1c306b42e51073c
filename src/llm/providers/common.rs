// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::ApiError;

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Tag a reqwest failure with its kind.
pub(crate) fn classify_reqwest_error(err: &reqwest::Error, timeout_ms: u64) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(timeout_ms)
    } else if err.is_decode() {
        ApiError::InvalidResponse(err.to_string())
    } else {
        ApiError::TransportFailure {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
