// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for aibar
//!
//! Handles loading and saving settings from ~/.aibar/settings.json, and the
//! `AiSettings` block the host pushes with every configuration update.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod io;
mod validation;

/// Built-in sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Built-in response token cap
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
/// Built-in cap on the rolling per-adapter history
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 50;
/// Built-in cap on history sent with each request
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 5;
/// Model selected when nothing else is known
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Main settings structure, stored in ~/.aibar/settings.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// API credentials per provider family
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Sampling and history limits
    #[serde(default)]
    pub ai: TuningConfig,

    /// Model used when the persisted state has no selection
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Override for the persisted session state file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            ai: TuningConfig::default(),
            default_model: default_model(),
            state_file: None,
        }
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// OpenAI configuration
    #[serde(default = "default_openai_key_config")]
    pub openai: ApiKeyConfig,

    /// Anthropic configuration
    #[serde(default = "default_anthropic_key_config")]
    pub anthropic: ApiKeyConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: default_openai_key_config(),
            anthropic: default_anthropic_key_config(),
        }
    }
}

/// Where a provider's API key comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    pub api_key_env: String,

    /// Custom endpoint URL (for proxies or testing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Sampling and history limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Total messages kept in an adapter's rolling history
    #[serde(default = "default_max_history_length")]
    pub max_history_length: usize,

    /// Non-system messages sent along with each new turn
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_history_length: default_max_history_length(),
            max_context_messages: default_max_context_messages(),
        }
    }
}

/// The AI configuration block exchanged with the host.
///
/// Every field is optional: the host sends whatever the user configured and
/// the gaps fall back to model overrides and built-in defaults. Field names
/// follow the host's dotted configuration keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(
        rename = "api.openaiApiKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub openai_api_key: Option<String>,

    #[serde(
        rename = "api.anthropicApiKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub anthropic_api_key: Option<String>,

    #[serde(
        rename = "ai.temperature",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f32>,

    #[serde(
        rename = "ai.maxTokens",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_tokens: Option<u32>,

    #[serde(
        rename = "ai.maxHistoryLength",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_history_length: Option<usize>,

    #[serde(
        rename = "ai.maxContextMessages",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_context_messages: Option<usize>,
}

/// Fully resolved configuration for one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_history_length: usize,
    pub max_context_messages: usize,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self::resolve(&AiSettings::default(), &AiSettings::default())
    }
}

impl EffectiveConfig {
    /// Layer the configuration: live settings win over model-specific
    /// overrides, which win over the built-in defaults.
    ///
    /// Empty API keys and zero caps count as unset.
    pub fn resolve(overrides: &AiSettings, live: &AiSettings) -> Self {
        fn key(live: &Option<String>, overrides: &Option<String>) -> Option<String> {
            live.as_deref()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| overrides.as_deref().filter(|k| !k.trim().is_empty()))
                .map(str::to_string)
        }

        fn cap(live: Option<usize>, overrides: Option<usize>, default: usize) -> usize {
            live.filter(|n| *n > 0)
                .or(overrides.filter(|n| *n > 0))
                .unwrap_or(default)
        }

        Self {
            openai_api_key: key(&live.openai_api_key, &overrides.openai_api_key),
            anthropic_api_key: key(&live.anthropic_api_key, &overrides.anthropic_api_key),
            temperature: live
                .temperature
                .or(overrides.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: live
                .max_tokens
                .filter(|n| *n > 0)
                .or(overrides.max_tokens.filter(|n| *n > 0))
                .unwrap_or(DEFAULT_MAX_TOKENS),
            max_history_length: cap(
                live.max_history_length,
                overrides.max_history_length,
                DEFAULT_MAX_HISTORY_LENGTH,
            ),
            max_context_messages: cap(
                live.max_context_messages,
                overrides.max_context_messages,
                DEFAULT_MAX_CONTEXT_MESSAGES,
            ),
        }
    }
}

impl Settings {
    /// The AI settings this file contributes, with API keys resolved from
    /// the environment first.
    pub fn ai_settings(&self) -> AiSettings {
        AiSettings {
            openai_api_key: self.get_openai_api_key(),
            anthropic_api_key: self.get_anthropic_api_key(),
            temperature: Some(self.ai.temperature),
            max_tokens: Some(self.ai.max_tokens),
            max_history_length: Some(self.ai.max_history_length),
            max_context_messages: Some(self.ai.max_context_messages),
        }
    }
}

fn default_openai_key_config() -> ApiKeyConfig {
    ApiKeyConfig {
        api_key: None,
        api_key_env: "OPENAI_API_KEY".to_string(),
        base_url: None,
    }
}

fn default_anthropic_key_config() -> ApiKeyConfig {
    ApiKeyConfig {
        api_key: None,
        api_key_env: "ANTHROPIC_API_KEY".to_string(),
        base_url: None,
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_max_history_length() -> usize {
    DEFAULT_MAX_HISTORY_LENGTH
}

fn default_max_context_messages() -> usize {
    DEFAULT_MAX_CONTEXT_MESSAGES
}
