// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use chatline::config::Settings;
use chatline::llm::{ModelConfigResolver, ModelFamily};
use tempfile::TempDir;

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.realtime.reconnect.max_attempts, 5);
    assert_eq!(settings.realtime.reconnect.base_delay_ms, 1_000);
    assert_eq!(settings.realtime.reconnect.max_delay_ms, 30_000);
    assert_eq!(settings.realtime.queue.capacity, 50);
    assert_eq!(settings.realtime.queue.max_age_ms, 300_000);
    assert_eq!(settings.completion.cache_ttl_ms, 300_000);
    assert_eq!(settings.completion.retry.max_retries, 2);
    assert_eq!(settings.completion.retry.base_delay_ms, 2_000);
    assert_eq!(settings.completion.max_history, 10);
    assert_eq!(settings.completion.max_turn_chars, 500);
}

#[test]
fn test_settings_model_table() {
    let settings = Settings::default();
    let resolver = ModelConfigResolver::new(settings.models);

    let (family, config) = resolver.resolve("deepseek-ai/DeepSeek-V3");
    assert_eq!(family, ModelFamily::DeepseekV3);
    assert_eq!(config.timeout_ms, 30_000);

    let (family, config) = resolver.resolve("Qwen/Qwen2-72B");
    assert_eq!(family, ModelFamily::Qwen);
    assert_eq!(config.timeout_ms, 25_000);

    let (family, config) = resolver.resolve("gpt-4");
    assert_eq!(family, ModelFamily::Default);
    assert_eq!(config.timeout_ms, 20_000);
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{
            "realtime": { "queue": { "capacity": 5 } },
            "models": { "qwen": { "temperature": 0.1, "max_tokens": 64, "top_p": 1.0,
                                  "presence_penalty": 0.0, "frequency_penalty": 0.0,
                                  "timeout_ms": 1000 } }
        }"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();

    assert_eq!(settings.realtime.queue.capacity, 5);
    assert_eq!(settings.realtime.queue.max_age_ms, 300_000);
    assert_eq!(settings.realtime.heartbeat_interval_ms, 5_000);
    assert_eq!(settings.models.qwen.timeout_ms, 1_000);
    assert_eq!(settings.models.deepseek_v3.timeout_ms, 30_000);
    assert!(settings.pricing.contains_key("gpt-4"));
}

#[test]
fn test_saved_file_uses_family_names() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    Settings::default().save_to(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["models"].get("deepseek-v3").is_some());
    assert!(raw["pricing"]["gpt-4"].get("input_per_1k").is_some());
    assert!(raw["api"].get("api_key").is_none());
}

#[test]
fn test_settings_api_key_priority() {
    // Unique env var name so parallel tests do not interfere
    let mut settings = Settings::default();
    settings.api.api_key_env = "CHATLINE_TEST_API_KEY_55012".to_string();
    settings.api.api_key = Some("config-key".to_string());
    assert_eq!(settings.get_api_key(), Some("config-key".to_string()));

    std::env::set_var("CHATLINE_TEST_API_KEY_55012", "env-key");
    assert_eq!(settings.get_api_key(), Some("env-key".to_string()));
    std::env::remove_var("CHATLINE_TEST_API_KEY_55012");
}

#[test]
fn test_auth_token_priority() {
    let mut settings = Settings::default();
    settings.realtime.auth_token_env = "CHATLINE_TEST_TOKEN_55013".to_string();
    assert_eq!(settings.get_auth_token(), None);

    settings.realtime.auth_token = Some("file-token".to_string());
    assert_eq!(settings.get_auth_token(), Some("file-token".to_string()));

    std::env::set_var("CHATLINE_TEST_TOKEN_55013", "env-token");
    assert_eq!(settings.get_auth_token(), Some("env-token".to_string()));
    std::env::remove_var("CHATLINE_TEST_TOKEN_55013");
}

#[test]
fn test_invalid_settings_report_field() {
    let mut settings = Settings::default();
    settings.completion.cache_ttl_ms = 0;
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("cache_ttl_ms"));

    let mut settings = Settings::default();
    settings.models.default.timeout_ms = 0;
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("models.default.timeout_ms"));
}
