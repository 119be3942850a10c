// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Persisted session and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::message::ProviderMessage;

/// Title every new session starts with
pub const DEFAULT_TITLE: &str = "New Chat";

/// Words of the first message used for a derived title
const TITLE_WORDS: usize = 3;
/// Longest derived title, before the ellipsis
const TITLE_MAX_CHARS: usize = 40;

/// Author of a persisted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One persisted chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub role: MessageRole,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn new(role: MessageRole, text: impl Into<String>, is_error: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            role,
            timestamp: Utc::now(),
            is_error,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text, false)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text, false)
    }

    /// Assistant message reporting a failure
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text, true)
    }
}

/// One conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Append a message and refresh the update time.
    pub fn push(&mut self, message: Message) {
        self.last_updated_at = message.timestamp.max(self.last_updated_at);
        self.messages.push(message);
    }

    /// Case-insensitive match on the title or any message text.
    /// `query` must already be lowercase.
    pub(crate) fn matches(&self, query: &str) -> bool {
        query.is_empty()
            || self.title.to_lowercase().contains(query)
            || self
                .messages
                .iter()
                .any(|m| m.text.to_lowercase().contains(query))
    }

    /// Non-error turns as provider messages, oldest first
    pub fn provider_messages(&self) -> Vec<ProviderMessage> {
        self.messages
            .iter()
            .filter(|m| !m.is_error)
            .map(|m| match m.role {
                MessageRole::User => ProviderMessage::user(m.text.clone()),
                MessageRole::Assistant => ProviderMessage::assistant(m.text.clone()),
            })
            .collect()
    }
}

/// Title derived from the first message: its first few words and an ellipsis.
pub fn derive_title(text: &str) -> String {
    let words = text
        .split_whitespace()
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    if words.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    let head: String = words.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", head.trim_end())
}
