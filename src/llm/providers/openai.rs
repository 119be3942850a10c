// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI chat completions client
//!
//! Implements [`ProviderTransport`] for the OpenAI family of models.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::common;
use crate::config::EffectiveConfig;
use crate::error::{AibarError, ApiError, Result};
use crate::llm::message::ProviderMessage;
use crate::llm::models::ModelFamily;
use crate::llm::provider::{AiResponse, ChunkCallback, ProviderTransport, TokenUsage};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const PROVIDER_NAME: &str = "OpenAI";

/// OpenAI provider for one model
pub struct OpenAiClient {
    client: Client,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(model, OPENAI_API_URL)
    }

    /// Create with a custom endpoint URL
    pub fn with_base_url(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ProviderMessage],
        config: &EffectiveConfig,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream,
        }
    }

    fn api_key<'a>(&self, config: &'a EffectiveConfig) -> Result<&'a str> {
        config
            .openai_api_key
            .as_deref()
            .ok_or_else(|| AibarError::MissingCredential {
                provider: PROVIDER_NAME.to_string(),
            })
    }
}

#[async_trait]
impl ProviderTransport for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn description(&self) -> String {
        format!("OpenAI's model ({})", self.model)
    }

    fn validate(&self, config: &EffectiveConfig) -> Result<()> {
        self.api_key(config)?;
        if !ModelFamily::OpenAi.supports(&self.model) {
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
            messages = messages.len(),
            stream = body.stream,
            "Sending OpenAI request"
        );

        let request = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&body);
        let response = common::send(PROVIDER_NAME, request, cancel).await?;

        let Some(on_chunk) = on_chunk else {
            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
            let text = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| ApiError::InvalidResponse("No choices in response".to_string()))?;
            let mut result = AiResponse::new(text);
            if let Some(usage) = parsed.usage {
                result = result.with_usage(usage.into());
            }
            return Ok(result);
        };

        let mut text = String::new();
        let mut usage = None;
        common::read_events(PROVIDER_NAME, response, cancel, |chunk: ChatChunk| {
            if let Some(delta) = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
            {
                if !delta.is_empty() {
                    on_chunk(&delta);
                    text.push_str(&delta);
                }
            }
            if let Some(u) = chunk.usage {
                usage = Some(TokenUsage::from(u));
            }
        })
        .await?;

        Ok(AiResponse { text, usage })
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ProviderMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(u: OpenAiUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}
