// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-family request parameters
//!
//! Model ids are classified into a coarse family by substring match on
//! known vendor tokens. Unrecognized ids use the `default` family.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ModelsConfig;

/// Coarse model family used for config lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "deepseek-v3")]
    DeepseekV3,
    #[serde(rename = "qwen")]
    Qwen,
    #[serde(rename = "default")]
    Default,
}

impl ModelFamily {
    /// Classify a model id (case-insensitive substring match).
    pub fn classify(model_id: &str) -> Self {
        let id = model_id.to_lowercase();
        if id.contains("deepseek") {
            ModelFamily::DeepseekV3
        } else if id.contains("qwen") {
            ModelFamily::Qwen
        } else {
            ModelFamily::Default
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::DeepseekV3 => "deepseek-v3",
            ModelFamily::Qwen => "qwen",
            ModelFamily::Default => "default",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable request parameters for one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// Per-attempt deadline
    pub timeout_ms: u64,
}

impl ModelConfig {
    pub fn deepseek_v3() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2000,
            top_p: 0.5,
            presence_penalty: 0.1,
            frequency_penalty: 0.1,
            timeout_ms: 30_000,
        }
    }

    pub fn qwen() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 3000,
            top_p: 0.9,
            presence_penalty: 0.2,
            frequency_penalty: 0.2,
            timeout_ms: 25_000,
        }
    }

    /// Parameters for unrecognized models
    pub fn fallback() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 2500,
            top_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            timeout_ms: 20_000,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Immutable family → config table, loaded once at startup
#[derive(Debug, Clone)]
pub struct ModelConfigResolver {
    models: ModelsConfig,
}

impl Default for ModelConfigResolver {
    fn default() -> Self {
        Self::new(ModelsConfig::default())
    }
}

impl ModelConfigResolver {
    pub fn new(models: ModelsConfig) -> Self {
        Self { models }
    }

    pub fn family(&self, model_id: &str) -> ModelFamily {
        ModelFamily::classify(model_id)
    }

    /// Resolve the family and its parameters for a model id.
    pub fn resolve(&self, model_id: &str) -> (ModelFamily, &ModelConfig) {
        let family = self.family(model_id);
        let config = match family {
            ModelFamily::DeepseekV3 => &self.models.deepseek_v3,
            ModelFamily::Qwen => &self.models.qwen,
            ModelFamily::Default => &self.models.default,
        };
        (family, config)
    }
}
