// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! History shaping and prompt assembly

use crate::config::CompletionConfig;
use crate::llm::message::{ChatMessage, HistoryTurn, Role, Sender};

/// Builds the message list sent with every completion request
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    max_history: usize,
    max_turn_chars: usize,
    topic_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from(&CompletionConfig::default())
    }
}

impl From<&CompletionConfig> for PromptBuilder {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            max_history: config.max_history,
            max_turn_chars: config.max_turn_chars,
            topic_chars: config.topic_chars,
        }
    }
}

impl PromptBuilder {
    /// Keep the last `max_history` turns, each truncated to the character budget.
    pub fn shape_history(&self, history: &[HistoryTurn]) -> Vec<ChatMessage> {
        let skip = history.len().saturating_sub(self.max_history);
        history[skip..]
            .iter()
            .map(|turn| ChatMessage {
                role: match turn.sender {
                    Sender::User => Role::User,
                    Sender::Assistant => Role::Assistant,
                },
                content: truncate_chars(&turn.content, self.max_turn_chars),
            })
            .collect()
    }

    /// System instruction, optional session topic, shaped history, new turn.
    pub fn build(&self, user_text: &str, history: &[HistoryTurn]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len().min(self.max_history) + 3);
        messages.push(ChatMessage::system(self.system_prompt.clone()));

        if let Some(opening) = history.first() {
            let topic: String = opening.content.chars().take(self.topic_chars).collect();
            messages.push(ChatMessage::system(format!(
                "Current conversation topic: {}...",
                topic
            )));
        }

        messages.extend(self.shape_history(history));
        messages.push(ChatMessage::user(user_text));
        messages
    }
}

/// Truncate on a char boundary, marking the cut with "...".
fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
        None => content.to_string(),
    }
}
