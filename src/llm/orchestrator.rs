// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion request orchestration
//!
//! `complete()` shapes the history, assembles the prompt, serves from the
//! response cache when it can, and otherwise runs the request through the
//! retry loop with a per-attempt deadline. The caller sees exactly one
//! outcome: a validated [`CompletionResult`] or a [`CompletionError`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{CompletionConfig, ModelsConfig, Settings};
use crate::error::{ApiError, CompletionError, Result};
use crate::llm::backend::{CompletionBackend, HttpBackend};
use crate::llm::cache::{CacheKey, ResponseCache};
use crate::llm::message::{
    ChatMessage, ChatReply, ChatRequest, CompletionMetadata, CompletionResult, HistoryTurn,
};
use crate::llm::model_config::{ModelConfigResolver, ModelFamily};
use crate::llm::prompt::PromptBuilder;
use crate::llm::retry::{with_retry, RetryPolicy};
use crate::pricing::{estimate_tokens, CostEstimator, PriceTable};

/// Orchestrates one-shot AI completions
pub struct CompletionOrchestrator {
    backend: Arc<dyn CompletionBackend>,
    resolver: ModelConfigResolver,
    cache: Mutex<ResponseCache>,
    retry: RetryPolicy,
    prompt: PromptBuilder,
    cost: Option<Arc<dyn CostEstimator>>,
}

impl CompletionOrchestrator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        config: &CompletionConfig,
        models: ModelsConfig,
    ) -> Self {
        Self {
            backend,
            resolver: ModelConfigResolver::new(models),
            cache: Mutex::new(ResponseCache::new(
                Duration::from_millis(config.cache_ttl_ms),
                config.cache_max_entries,
            )),
            retry: RetryPolicy::from(&config.retry),
            prompt: PromptBuilder::from(config),
            cost: None,
        }
    }

    /// Attach a cost collaborator used to fill `metadata.estimated_cost`.
    pub fn with_cost_estimator(mut self, estimator: Arc<dyn CostEstimator>) -> Self {
        self.cost = Some(estimator);
        self
    }

    /// Build an HTTP-backed orchestrator from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = HttpBackend::from_config(&settings.api, settings.get_api_key())?;
        let prices = PriceTable::new(settings.pricing.clone());
        Ok(Self::new(
            Arc::new(backend),
            &settings.completion,
            settings.models.clone(),
        )
        .with_cost_estimator(Arc::new(prices)))
    }

    pub fn resolver(&self) -> &ModelConfigResolver {
        &self.resolver
    }

    /// Entries currently held, including expired ones awaiting cleanup
    pub fn cached_entries(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Produce a completion for `user_text` given the prior conversation.
    pub async fn complete(
        &self,
        user_text: &str,
        model_id: &str,
        history: &[HistoryTurn],
    ) -> std::result::Result<CompletionResult, CompletionError> {
        let messages = self.prompt.build(user_text, history);
        let key = CacheKey::new(model_id, user_text);

        if let Some(hit) = self.lookup(&key) {
            tracing::debug!(model = model_id, "completion served from cache");
            return Ok(hit);
        }

        let (family, config) = self.resolver.resolve(model_id);
        let request = ChatRequest::new(model_id, messages, config);
        let deadline = config.timeout();
        let deadline_ms = config.timeout_ms;

        tracing::debug!(
            model = model_id,
            family = %family,
            timeout_ms = deadline_ms,
            messages = request.messages.len(),
            "starting completion"
        );

        let backend = self.backend.as_ref();
        let request_ref = &request;
        let outcome = with_retry(
            move |attempt| async move {
                tracing::debug!(model = request_ref.model.as_str(), attempt = attempt + 1, "sending attempt");
                match tokio::time::timeout(deadline, backend.send(request_ref)).await {
                    Ok(result) => result,
                    Err(_) => Err(ApiError::Timeout(deadline_ms)),
                }
            },
            &self.retry,
            "completion",
        )
        .await;

        match outcome {
            Ok(done) => {
                let result = self.normalize(&request, family, done.value, done.attempts);
                self.lock_cache().insert(key, result.clone(), Instant::now());
                tracing::info!(
                    model = model_id,
                    attempts = done.attempts,
                    tokens = result.metadata.tokens_used,
                    "completion succeeded"
                );
                Ok(result)
            }
            Err(exhausted) => {
                tracing::error!(
                    model = model_id,
                    kind = %exhausted.error.kind(),
                    attempts = exhausted.attempts,
                    "completion failed: {}",
                    exhausted.error
                );
                Err(CompletionError::from_api(&exhausted.error, exhausted.attempts))
            }
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<CompletionResult> {
        let now = Instant::now();
        let mut cache = self.lock_cache();
        let purged = cache.cleanup(now);
        if purged > 0 {
            tracing::debug!(purged, "expired cache entries removed");
        }
        cache.get(key, now).map(|hit| {
            let mut result = hit.clone();
            result.metadata.cached = true;
            result
        })
    }

    fn normalize(
        &self,
        request: &ChatRequest,
        family: ModelFamily,
        reply: ChatReply,
        attempts: u32,
    ) -> CompletionResult {
        let (input, output) = match &reply.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (
                prompt_tokens(&request.messages),
                estimate_tokens(&reply.text),
            ),
        };
        let tokens_used = reply
            .usage
            .as_ref()
            .map(|usage| usage.total_tokens)
            .unwrap_or(input + output);
        let estimated_cost = self
            .cost
            .as_ref()
            .map(|estimator| estimator.cost(&request.model, input, output));

        CompletionResult {
            metadata: CompletionMetadata {
                family,
                response_length: reply.text.chars().count(),
                tokens_used,
                attempts,
                cached: false,
                estimated_cost,
            },
            text: reply.text,
            model: request.model.clone(),
            usage: reply.usage,
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, ResponseCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("response cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn prompt_tokens(messages: &[ChatMessage]) -> u32 {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}
