// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatline - resilient network layer for a chat client.
//!
//! Two channels keep a conversation flowing:
//! - `llm`: one-shot AI completions over HTTP with per-model parameters,
//!   a response cache, bounded retries and per-attempt deadlines
//! - `realtime`: a websocket session that queues writes while offline,
//!   detects silent disconnects and reconnects with backoff
//!
//! `client::ChatClient` wires both from `config::Settings`.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod pricing;
pub mod realtime;

pub use client::ChatClient;
pub use error::{ApiError, ChatError, CompletionError, ErrorKind, Result};
