// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion backend trait
//!
//! Defines the seam between the orchestrator and the HTTP channel. A
//! backend performs exactly one attempt and tags any failure with its
//! [`crate::error::ErrorKind`] before returning it.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::llm::message::{ChatReply, ChatRequest};

pub use crate::llm::providers::HttpBackend;

/// One-shot completion transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Perform a single request. The caller owns timeouts and retries.
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ApiError>;
}
