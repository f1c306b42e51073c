// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ChatError, Result};

use super::Settings;

impl Settings {
    /// Get the completion API key, checking env var first.
    pub fn get_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.api.api_key_env)
            .ok()
            .or_else(|| self.api.api_key.clone())
    }

    /// Get the realtime session token, checking env var first.
    pub fn get_auth_token(&self) -> Option<String> {
        std::env::var(&self.realtime.auth_token_env)
            .ok()
            .or_else(|| self.realtime.auth_token.clone())
    }

    /// Reject configurations the networking layer cannot honor.
    pub fn validate(&self) -> Result<()> {
        let api = &self.api;
        if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
            return Err(invalid(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                api.base_url
            )));
        }

        let rt = &self.realtime;
        if !(rt.ws_url.starts_with("ws://") || rt.ws_url.starts_with("wss://")) {
            return Err(invalid(format!(
                "realtime.ws_url must be a ws(s) URL, got '{}'",
                rt.ws_url
            )));
        }
        if rt.heartbeat_interval_ms == 0 {
            return Err(invalid("realtime.heartbeat_interval_ms must be positive"));
        }
        if rt.liveness_timeout_ms <= rt.heartbeat_interval_ms {
            return Err(invalid(format!(
                "realtime.liveness_timeout_ms ({}) must exceed heartbeat_interval_ms ({})",
                rt.liveness_timeout_ms, rt.heartbeat_interval_ms
            )));
        }
        if rt.reconnect.base_delay_ms > rt.reconnect.max_delay_ms {
            return Err(invalid(
                "realtime.reconnect.base_delay_ms must not exceed max_delay_ms",
            ));
        }
        if rt.queue.capacity == 0 {
            return Err(invalid("realtime.queue.capacity must be at least 1"));
        }

        let completion = &self.completion;
        if completion.cache_ttl_ms == 0 {
            return Err(invalid("completion.cache_ttl_ms must be positive"));
        }
        if completion.cache_max_entries == 0 {
            return Err(invalid("completion.cache_max_entries must be at least 1"));
        }
        if completion.max_history == 0 {
            return Err(invalid("completion.max_history must be at least 1"));
        }
        if !(0.0..=1.0).contains(&completion.retry.jitter) {
            return Err(invalid("completion.retry.jitter must be within 0.0..=1.0"));
        }

        for (family, model) in [
            ("deepseek-v3", &self.models.deepseek_v3),
            ("qwen", &self.models.qwen),
            ("default", &self.models.default),
        ] {
            if model.timeout_ms == 0 {
                return Err(invalid(format!("models.{family}.timeout_ms must be positive")));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ChatError {
    ChatError::Config(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_liveness_must_exceed_interval() {
        let mut settings = Settings::default();
        settings.realtime.liveness_timeout_ms = settings.realtime.heartbeat_interval_ms;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("liveness_timeout_ms"));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let mut settings = Settings::default();
        settings.realtime.queue.capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_reconnect_base_above_cap_rejected() {
        let mut settings = Settings::default();
        settings.realtime.reconnect.base_delay_ms = 60_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_bad_urls_rejected() {
        let mut settings = Settings::default();
        settings.api.base_url = "ftp://example.com".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.realtime.ws_url = "http://example.com/ws".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_jitter_out_of_range_rejected() {
        let mut settings = Settings::default();
        settings.completion.retry.jitter = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_api_key_from_config_when_env_missing() {
        let mut settings = Settings::default();
        settings.api.api_key_env = "CHATLINE_TEST_UNSET_KEY_93121".to_string();
        settings.api.api_key = Some("config-key".to_string());
        assert_eq!(settings.get_api_key(), Some("config-key".to_string()));
    }
}
