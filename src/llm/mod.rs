// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion channel
//!
//! Model parameter resolution, the response cache, retry policy, prompt
//! assembly and the orchestrator that ties them to a [`CompletionBackend`].

pub mod backend;
pub mod cache;
pub mod message;
pub mod mock_backend;
pub mod model_config;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod retry;

pub use backend::CompletionBackend;
pub use message::*;
pub use model_config::{ModelConfig, ModelConfigResolver, ModelFamily};
pub use orchestrator::CompletionOrchestrator;
