// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic Claude API client
//!
//! Implements [`ProviderTransport`] for the Claude family of models.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::common;
use crate::config::EffectiveConfig;
use crate::error::{AibarError, ApiError, Result};
use crate::llm::message::{ProviderMessage, Role};
use crate::llm::models::ModelFamily;
use crate::llm::provider::{AiResponse, ChunkCallback, ProviderTransport, TokenUsage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "Claude";
/// Prefix used in API error messages
const API_LABEL: &str = "Anthropic";

/// Anthropic Claude provider for one model
pub struct ClaudeClient {
    client: Client,
    model: String,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(model, ANTHROPIC_API_URL)
    }

    /// Create with a custom endpoint URL
    pub fn with_base_url(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    /// The messages API takes the system prompt as a separate field.
    fn build_request<'a>(
        &'a self,
        messages: &'a [ProviderMessage],
        config: &EffectiveConfig,
        stream: bool,
    ) -> MessagesRequest<'a> {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>();
        MessagesRequest {
            model: &self.model,
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| ClaudeMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream,
        }
    }

    fn api_key<'a>(&self, config: &'a EffectiveConfig) -> Result<&'a str> {
        config
            .anthropic_api_key
            .as_deref()
            .ok_or_else(|| AibarError::MissingCredential {
                provider: API_LABEL.to_string(),
            })
    }
}

#[async_trait]
impl ProviderTransport for ClaudeClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn description(&self) -> String {
        format!("Anthropic's model ({})", self.model)
    }

    fn validate(&self, config: &EffectiveConfig) -> Result<()> {
        self.api_key(config)?;
        if !ModelFamily::Claude.supports(&self.model) {
            return Err(AibarError::UnsupportedModel(self.model.clone()));
        }
        Ok(())
    }

    async fn call(
        &self,
        messages: &[ProviderMessage],
        config: &EffectiveConfig,
        on_chunk: Option<&ChunkCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<AiResponse> {
        self.validate(config)?;
        let api_key = self.api_key(config)?;
        let body = self.build_request(messages, config, on_chunk.is_some());

        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            stream = body.stream,
            "Sending Anthropic request"
        );

        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response = common::send(API_LABEL, request, cancel).await?;

        let Some(on_chunk) = on_chunk else {
            let parsed: MessagesResponse = response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
            let text = parsed
                .content
                .into_iter()
                .find_map(|block| block.text)
                .ok_or_else(|| ApiError::InvalidResponse("No content in response".to_string()))?;
            let mut result = AiResponse::new(text);
            if let Some(usage) = parsed.usage {
                result = result.with_usage(TokenUsage::from_counts(
                    usage.input_tokens.unwrap_or(0),
                    usage.output_tokens.unwrap_or(0),
                ));
            }
            return Ok(result);
        };

        let mut text = String::new();
        let mut input_tokens = None;
        let mut output_tokens = None;
        common::read_events(API_LABEL, response, cancel, |event: StreamEvent| {
            if let Some(delta) = event.delta.and_then(|d| d.text) {
                if !delta.is_empty() {
                    on_chunk(&delta);
                    text.push_str(&delta);
                }
            }
            let usage = event
                .usage
                .or_else(|| event.message.and_then(|m| m.usage));
            if let Some(usage) = usage {
                input_tokens = usage.input_tokens.or(input_tokens);
                output_tokens = usage.output_tokens.or(output_tokens);
            }
        })
        .await?;

        let usage = if input_tokens.is_some() || output_tokens.is_some() {
            Some(TokenUsage::from_counts(
                input_tokens.unwrap_or(0),
                output_tokens.unwrap_or(0),
            ))
        } else {
            None
        };
        Ok(AiResponse { text, usage })
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<ClaudeMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

/// Any streamed event; only the fields carrying text or usage are read.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
    #[serde(default)]
    message: Option<StreamMessage>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}
