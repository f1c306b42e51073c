// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted completion backend for tests
//!
//! Replies are consumed in order; once the script runs out the last entry
//! repeats. Every request is recorded so tests can assert on what the
//! orchestrator actually sent.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::ApiError;
use crate::llm::backend::CompletionBackend;
use crate::llm::message::{ChatReply, ChatRequest, Usage};

/// One scripted step
#[derive(Debug, Clone)]
pub struct MockStep {
    pub outcome: Result<ChatReply, ApiError>,
    /// Simulated latency before the outcome is returned
    pub delay: Duration,
}

impl MockStep {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            outcome: Ok(ChatReply {
                text: text.into(),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 20,
                    total_tokens: 30,
                }),
            }),
            delay: Duration::ZERO,
        }
    }

    pub fn fail(error: ApiError) -> Self {
        Self {
            outcome: Err(error),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A mock backend for testing
#[derive(Clone)]
pub struct MockBackend {
    steps: Arc<Mutex<Vec<MockStep>>>,
    cursor: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(vec![MockStep::reply("Hello from mock")])
    }
}

impl MockBackend {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps)),
            cursor: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Always answer with the same text
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![MockStep::reply(text)])
    }

    /// Always fail with the same error
    pub fn failing(error: ApiError) -> Self {
        Self::new(vec![MockStep::fail(error)])
    }

    /// Append a step to the script
    pub fn push(&self, step: MockStep) {
        lock_or_recover(&self.steps).push(step);
    }

    /// Number of `send` calls made so far
    pub fn call_count(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        lock_or_recover(&self.recorded_requests).clone()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        lock_or_recover(&self.recorded_requests).last().cloned()
    }

    fn next_step(&self) -> MockStep {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let steps = lock_or_recover(&self.steps);
        steps
            .get(index)
            .or_else(|| steps.last())
            .cloned()
            .unwrap_or_else(|| MockStep::fail(ApiError::InvalidResponse("empty script".into())))
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("mock backend lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        lock_or_recover(&self.recorded_requests).push(request.clone());
        let step = self.next_step();
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.outcome
    }
}
