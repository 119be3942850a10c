// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{AibarError, Result};

use super::Settings;

impl Settings {
    /// Get the API key for OpenAI, checking env var first.
    pub fn get_openai_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.providers.openai.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.providers.openai.api_key.clone())
    }

    /// Get the API key for Anthropic, checking env var first.
    pub fn get_anthropic_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.providers.anthropic.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.providers.anthropic.api_key.clone())
    }

    /// Reject values no provider would accept.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(AibarError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.ai.temperature
            )));
        }
        if self.ai.max_tokens == 0 {
            return Err(AibarError::Config("max_tokens must be positive".into()));
        }
        if self.ai.max_history_length == 0 {
            return Err(AibarError::Config(
                "max_history_length must be positive".into(),
            ));
        }
        if self.ai.max_context_messages == 0 {
            return Err(AibarError::Config(
                "max_context_messages must be positive".into(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(AibarError::Config("default_model must not be empty".into()));
        }
        Ok(())
    }
}
