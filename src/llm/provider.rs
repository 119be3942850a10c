// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider transport trait and related types
//!
//! A transport turns a normalized message list into one vendor HTTP call and
//! hands back the uniform [`AiResponse`]. History, windowing and prompts live
//! one level up in `chat::engine`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::EffectiveConfig;
use crate::error::Result;
use crate::llm::message::ProviderMessage;

/// Receives each incremental piece of text while a response streams in
pub type ChunkCallback<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// Capability interface shared by every provider family
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Provider display name (e.g., "OpenAI", "Claude")
    fn name(&self) -> &str;

    /// Model identifier this transport talks to
    fn model(&self) -> &str;

    /// Human-readable description of the model
    fn description(&self) -> String;

    /// Check credentials and model before any network traffic
    fn validate(&self, config: &EffectiveConfig) -> Result<()>;

    /// Send the messages and return the full reply.
    ///
    /// When `on_chunk` is set the response is streamed and every text delta
    /// is passed to it before the accumulated transcript is returned.
    async fn call(
        &self,
        messages: &[ProviderMessage],
        config: &EffectiveConfig,
        on_chunk: Option<&ChunkCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<AiResponse>;
}

/// Normalized provider reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl AiResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Token usage statistics, normalized across vendors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Build from prompt/completion counts, deriving the total.
    pub fn from_counts(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}
