// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Wire frames for the realtime socket
//!
//! Every frame is a JSON object with a `type` discriminator. Outbound
//! frames are stamped with an ISO-8601 `timestamp` and, in production
//! mode, the auth token.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::error::Result;

pub const AUTH: &str = "auth";
pub const PING: &str = "ping";
pub const PONG: &str = "pong";
pub const CHAT: &str = "chat";
pub const MESSAGE: &str = "message";
pub const CHAT_RESPONSE: &str = "chat_response";

/// An inbound frame as delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Value of the `type` field
    pub kind: String,
    /// Id of the chat frame this replies to, if known
    pub reply_to: Option<String>,
    /// The whole decoded frame
    pub payload: Value,
}

impl InboundMessage {
    /// Decode a text frame. Frames without a string `type` are delivered
    /// as plain messages; only undecodable text is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(text)?;
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(MESSAGE)
            .to_string();
        let reply_to = payload
            .get("reply_to")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            kind,
            reply_to,
            payload,
        })
    }

    pub fn is_pong(&self) -> bool {
        self.kind == PONG
    }

    pub fn is_chat_response(&self) -> bool {
        self.kind == CHAT_RESPONSE
    }

    /// Text body of a chat reply, when present
    pub fn content(&self) -> Option<&str> {
        self.payload
            .get("content")
            .or_else(|| self.payload.get("message"))
            .and_then(Value::as_str)
    }
}

/// Turn a caller payload into a frame object with a `type`.
///
/// Non-object payloads are wrapped as `{"type":"message","data":...}`; objects
/// without a type are treated as plain messages.
pub fn normalize(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(mut map) => {
            if !map.get("type").is_some_and(Value::is_string) {
                map.insert("type".to_string(), Value::from(MESSAGE));
            }
            map
        }
        other => {
            let mut map = Map::new();
            map.insert("type".to_string(), Value::from(MESSAGE));
            map.insert("data".to_string(), other);
            map
        }
    }
}

/// Whether a frame of this type takes part in reply correlation
pub fn is_chat_kind(kind: &str) -> bool {
    kind == CHAT || kind == MESSAGE
}

/// A frame ready for the wire, plus its correlation id if it has one
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundText {
    pub text: String,
    pub chat_id: Option<String>,
}

/// Stamp and serialize an outbound frame.
pub fn encode(
    payload: &Value,
    now: DateTime<Utc>,
    token: Option<&str>,
) -> Result<OutboundText> {
    let mut frame = normalize(payload.clone());

    let kind = frame
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(MESSAGE)
        .to_string();
    let chat_id = if is_chat_kind(&kind) {
        let id = match frame.get("id").and_then(Value::as_str) {
            Some(existing) => existing.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        frame.insert("id".to_string(), Value::from(id.clone()));
        Some(id)
    } else {
        None
    };

    frame.insert(
        "timestamp".to_string(),
        Value::from(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    if let Some(token) = token {
        frame.insert("token".to_string(), Value::from(token));
    }

    Ok(OutboundText {
        text: serde_json::to_string(&Value::Object(frame))?,
        chat_id,
    })
}

pub fn ping() -> Value {
    json!({ "type": PING })
}

pub fn auth(token: &str) -> Value {
    json!({ "type": AUTH, "token": token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_inbound() {
        let msg =
            InboundMessage::parse(r#"{"type":"chat_response","content":"hi","reply_to":"abc"}"#)
                .unwrap();
        assert!(msg.is_chat_response());
        assert_eq!(msg.reply_to.as_deref(), Some("abc"));
        assert_eq!(msg.content(), Some("hi"));
    }

    #[test]
    fn test_parse_untyped_frame_as_message() {
        let msg = InboundMessage::parse(r#"{"content":"x"}"#).unwrap();
        assert_eq!(msg.kind, MESSAGE);
        assert_eq!(msg.content(), Some("x"));

        let msg = InboundMessage::parse(r#"{"type":7,"content":"y"}"#).unwrap();
        assert_eq!(msg.kind, MESSAGE);

        let msg = InboundMessage::parse("42").unwrap();
        assert_eq!(msg.kind, MESSAGE);
        assert_eq!(msg.payload, json!(42));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(InboundMessage::parse("not json").is_err());
    }

    #[test]
    fn test_pong_detection() {
        assert!(InboundMessage::parse(r#"{"type":"pong"}"#).unwrap().is_pong());
        assert!(!InboundMessage::parse(r#"{"type":"ping"}"#).unwrap().is_pong());
    }

    #[test]
    fn test_encode_stamps_timestamp_and_id() {
        let out = encode(&json!({"type": "chat", "content": "hi"}), fixed_now(), None).unwrap();
        let frame: Value = serde_json::from_str(&out.text).unwrap();

        assert_eq!(frame["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(frame["id"].as_str(), out.chat_id.as_deref());
        assert!(frame.get("token").is_none());
    }

    #[test]
    fn test_encode_keeps_caller_id_and_adds_token() {
        let out = encode(
            &json!({"type": "message", "id": "mine"}),
            fixed_now(),
            Some("secret"),
        )
        .unwrap();
        let frame: Value = serde_json::from_str(&out.text).unwrap();

        assert_eq!(out.chat_id.as_deref(), Some("mine"));
        assert_eq!(frame["token"], "secret");
    }

    #[test]
    fn test_encode_ping_has_no_id() {
        let out = encode(&ping(), fixed_now(), None).unwrap();
        assert!(out.chat_id.is_none());
        assert!(out.text.contains("\"type\":\"ping\""));
    }

    #[test]
    fn test_normalize_wraps_non_objects() {
        let frame = normalize(json!("hello"));
        assert_eq!(frame["type"], MESSAGE);
        assert_eq!(frame["data"], "hello");

        let frame = normalize(json!({"content": "x"}));
        assert_eq!(frame["type"], MESSAGE);
    }
}
