// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Known models and their provider families

use serde::Serialize;

/// Models served through the OpenAI chat completions API
pub const OPENAI_MODELS: &[&str] = &[
    "gpt-4",
    "gpt-4-turbo",
    "gpt-4o",
    "gpt-4o-mini",
    "o1",
    "o1-mini",
    "o1-preview",
];

/// Models served through the Anthropic messages API
pub const CLAUDE_MODELS: &[&str] = &[
    "claude-3-opus",
    "claude-3.5-haiku",
    "claude-3.5-sonnet",
    "claude-3.5-sonnet-20241022",
];

/// Provider family a model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    OpenAi,
    Claude,
}

impl ModelFamily {
    /// Classify a model identifier by membership in each family's model set.
    pub fn of(model: &str) -> Option<Self> {
        if OPENAI_MODELS.contains(&model) {
            Some(ModelFamily::OpenAi)
        } else if CLAUDE_MODELS.contains(&model) {
            Some(ModelFamily::Claude)
        } else {
            None
        }
    }

    pub fn models(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::OpenAi => OPENAI_MODELS,
            ModelFamily::Claude => CLAUDE_MODELS,
        }
    }

    pub fn supports(&self, model: &str) -> bool {
        self.models().contains(&model)
    }

    /// Display name of the provider
    pub fn provider_name(&self) -> &'static str {
        match self {
            ModelFamily::OpenAi => "OpenAI",
            ModelFamily::Claude => "Claude",
        }
    }
}

/// A selectable model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub family: ModelFamily,
}

/// Every known model, OpenAI first
pub fn all_models() -> Vec<ModelInfo> {
    [ModelFamily::OpenAi, ModelFamily::Claude]
        .into_iter()
        .flat_map(|family| {
            family
                .models()
                .iter()
                .map(move |id| ModelInfo { id, family })
        })
        .collect()
}
