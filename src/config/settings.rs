// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for chatline
//!
//! Handles loading and saving settings from ~/.chatline/settings.json

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::llm::model_config::ModelConfig;
use crate::pricing::ModelPrice;

mod io;
mod validation;

/// Main settings structure, stored in ~/.chatline/settings.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Completion API endpoint and credentials
    #[serde(default)]
    pub api: ApiConfig,

    /// Realtime WebSocket channel
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Completion orchestration (history shaping, cache, retry)
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Request parameters per model family
    #[serde(default)]
    pub models: ModelsConfig,

    /// Per-model prices used for cost estimates
    #[serde(default = "default_pricing")]
    pub pricing: HashMap<String, ModelPrice>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            realtime: RealtimeConfig::default(),
            completion: CompletionConfig::default(),
            models: ModelsConfig::default(),
            pricing: default_pricing(),
        }
    }
}

/// Completion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; requests go to `{base_url}/chat/completions`
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
        }
    }
}

/// Realtime channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Session token (if stored directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Environment variable name for the session token
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,

    /// Send an auth frame on open and stamp every frame with the token
    #[serde(default)]
    pub production: bool,

    /// Deadline for the socket handshake
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Interval between pings
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Time without a pong after which the connection is considered dead
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub queue: QueueConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            auth_token: None,
            auth_token_env: default_auth_token_env(),
            production: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
            reconnect: ReconnectConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Reconnect backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Attempts before giving up and reporting a fatal connectivity error
    #[serde(default = "default_reconnect_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first reconnect attempt
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on the reconnect delay
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_reconnect_max_attempts(),
            base_delay_ms: default_reconnect_base_delay_ms(),
            max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

/// Outbound queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of messages held while disconnected
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Queued messages older than this are discarded instead of sent
    #[serde(default = "default_queue_max_age_ms")]
    pub max_age_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_age_ms: default_queue_max_age_ms(),
        }
    }
}

/// Completion orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// How long a cached response may be served
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Upper bound on live cache entries
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Number of most recent history turns sent with a request
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Per-turn character budget
    #[serde(default = "default_max_turn_chars")]
    pub max_turn_chars: usize,

    /// Characters of the opening turn used for the session topic
    #[serde(default = "default_topic_chars")]
    pub topic_chars: usize,

    /// Fixed system instruction
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_entries: default_cache_max_entries(),
            max_history: default_max_history(),
            max_turn_chars: default_max_turn_chars(),
            topic_chars: default_topic_chars(),
            system_prompt: default_system_prompt(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry settings for completion calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter percentage (0.0 to 1.0) for randomizing delays
    #[serde(default)]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: 0.0,
        }
    }
}

/// Request parameters for each model family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(rename = "deepseek-v3", default = "ModelConfig::deepseek_v3")]
    pub deepseek_v3: ModelConfig,

    #[serde(default = "ModelConfig::qwen")]
    pub qwen: ModelConfig,

    #[serde(default = "ModelConfig::fallback")]
    pub default: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            deepseek_v3: ModelConfig::deepseek_v3(),
            qwen: ModelConfig::qwen(),
            default: ModelConfig::fallback(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_api_key_env() -> String {
    "CHATLINE_API_KEY".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_auth_token_env() -> String {
    "CHATLINE_AUTH_TOKEN".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_liveness_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_queue_capacity() -> usize {
    50
}

fn default_queue_max_age_ms() -> u64 {
    5 * 60 * 1000
}

fn default_cache_ttl_ms() -> u64 {
    5 * 60 * 1000
}

fn default_cache_max_entries() -> usize {
    256
}

fn default_max_history() -> usize {
    10
}

fn default_max_turn_chars() -> usize {
    500
}

fn default_topic_chars() -> usize {
    100
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_system_prompt() -> String {
    "You are a professional AI assistant. Answer accurately and in depth, \
     organize answers with headings and lists, include code examples for \
     technical questions, explain terminology plainly, reason step by step \
     through complex problems, and keep the conversation coherent."
        .to_string()
}

fn default_pricing() -> HashMap<String, ModelPrice> {
    let mut pricing = HashMap::new();
    pricing.insert(
        "gpt-3.5-turbo".to_string(),
        ModelPrice {
            input_per_1k: 0.002,
            output_per_1k: 0.002,
        },
    );
    pricing.insert(
        "gpt-4".to_string(),
        ModelPrice {
            input_per_1k: 0.03,
            output_per_1k: 0.06,
        },
    );
    pricing.insert(
        "claude-2".to_string(),
        ModelPrice {
            input_per_1k: 0.008,
            output_per_1k: 0.024,
        },
    );
    pricing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "http://localhost:3000");
        assert_eq!(settings.realtime.ws_url, "ws://localhost:3000/ws");
        assert!(!settings.realtime.production);
        assert!(settings.pricing.contains_key("gpt-4"));
    }

    #[test]
    fn test_realtime_config_default() {
        let config = RealtimeConfig::default();
        assert_eq!(config.heartbeat_interval_ms, 5_000);
        assert_eq!(config.liveness_timeout_ms, 10_000);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.base_delay_ms, 1_000);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert_eq!(config.queue.capacity, 50);
        assert_eq!(config.queue.max_age_ms, 300_000);
    }

    #[test]
    fn test_completion_config_default() {
        let config = CompletionConfig::default();
        assert_eq!(config.cache_ttl_ms, 300_000);
        assert_eq!(config.max_history, 10);
        assert_eq!(config.max_turn_chars, 500);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay_ms, 2_000);
        assert_eq!(config.retry.jitter, 0.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "api": { "base_url": "https://api.example.com/v1" },
            "realtime": { "queue": { "capacity": 5 } },
            "models": { "qwen": { "temperature": 0.1, "max_tokens": 10, "top_p": 1.0,
                                  "presence_penalty": 0.0, "frequency_penalty": 0.0,
                                  "timeout_ms": 1000 } }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.api.base_url, "https://api.example.com/v1");
        assert_eq!(settings.api.api_key_env, "CHATLINE_API_KEY");
        assert_eq!(settings.realtime.queue.capacity, 5);
        assert_eq!(settings.realtime.queue.max_age_ms, 300_000);
        assert_eq!(settings.models.qwen.max_tokens, 10);
        assert_eq!(settings.models.deepseek_v3.timeout_ms, 30_000);
    }

    #[test]
    fn test_models_config_uses_family_names() {
        let value = serde_json::to_value(ModelsConfig::default()).unwrap();
        assert!(value.get("deepseek-v3").is_some());
        assert!(value.get("qwen").is_some());
        assert!(value.get("default").is_some());
    }
}
