// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation engine
//!
//! A [`ProviderAdapter`] wraps one provider transport with its own rolling
//! message history and layered configuration. Each `execute` is one turn:
//!
//! 1. resolve the effective configuration
//! 2. window the history to `max_context_messages`
//! 3. format the new turn through the prompt catalog
//! 4. call the transport
//! 5. on success record the turn and trim to `max_history_length`
//!
//! History holds at most one system message, always at index 0. A failed or
//! cancelled call leaves the history untouched.

use std::sync::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::chat::prompts::{AiCommand, CommandParams, CommandPrompt, PromptCatalog};
use crate::config::{AiSettings, EffectiveConfig};
use crate::error::Result;
use crate::llm::message::ProviderMessage;
use crate::llm::provider::{AiResponse, ChunkCallback, ProviderTransport};

/// Keep the first system message plus the last `budget` non-system messages.
fn keep_recent(history: &[ProviderMessage], budget: usize) -> Vec<ProviderMessage> {
    let system = history.iter().find(|m| m.is_system());
    let rest: Vec<&ProviderMessage> = history.iter().filter(|m| !m.is_system()).collect();
    let start = rest.len().saturating_sub(budget);
    system
        .into_iter()
        .chain(rest[start..].iter().copied())
        .cloned()
        .collect()
}

/// History to send with a new turn: unchanged when within `cap`, otherwise
/// the leading system message and the most recent `cap` other messages.
pub fn window_history(history: &[ProviderMessage], cap: usize) -> Vec<ProviderMessage> {
    if history.len() <= cap {
        return history.to_vec();
    }
    keep_recent(history, cap)
}

/// Trim stored history to at most `max_len` messages in total, keeping the
/// leading system message.
pub fn trim_history(history: &[ProviderMessage], max_len: usize) -> Vec<ProviderMessage> {
    if history.len() <= max_len {
        return history.to_vec();
    }
    let system_count = usize::from(history.iter().any(|m| m.is_system()));
    keep_recent(history, max_len.saturating_sub(system_count))
}

struct ConfigLayers {
    overrides: AiSettings,
    live: AiSettings,
}

/// One provider transport plus its conversation state
pub struct ProviderAdapter {
    transport: Box<dyn ProviderTransport>,
    catalog: PromptCatalog,
    config: RwLock<ConfigLayers>,
    history: Mutex<Vec<ProviderMessage>>,
}

impl ProviderAdapter {
    pub fn new(transport: Box<dyn ProviderTransport>, live: AiSettings) -> Self {
        Self {
            transport,
            catalog: PromptCatalog::default(),
            config: RwLock::new(ConfigLayers {
                overrides: AiSettings::default(),
                live,
            }),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Model-specific settings, layered under the live settings
    pub fn with_overrides(self, overrides: AiSettings) -> Self {
        self.write_config(|layers| layers.overrides = overrides);
        self
    }

    /// Restrict or replace the command catalog
    pub fn with_catalog(mut self, catalog: PromptCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn model(&self) -> &str {
        self.transport.model()
    }

    pub fn description(&self) -> String {
        self.transport.description()
    }

    fn write_config(&self, f: impl FnOnce(&mut ConfigLayers)) {
        let mut layers = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut layers);
    }

    /// Replace the live settings. History is kept.
    pub fn update_config(&self, live: AiSettings) {
        tracing::debug!(model = %self.model(), "Updating adapter configuration");
        self.write_config(|layers| layers.live = live);
    }

    pub fn effective_config(&self) -> EffectiveConfig {
        let layers = self
            .config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        EffectiveConfig::resolve(&layers.overrides, &layers.live)
    }

    /// Check credentials and model without sending anything
    pub fn validate(&self) -> Result<()> {
        self.transport.validate(&self.effective_config())
    }

    pub fn supported_commands(&self) -> Vec<AiCommand> {
        self.catalog.commands()
    }

    pub fn command_prompt(&self, command: AiCommand) -> Option<&CommandPrompt> {
        self.catalog.get(command)
    }

    /// Snapshot of the rolling history
    pub async fn history(&self) -> Vec<ProviderMessage> {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Replace the rolling history, e.g. when resuming a stored conversation.
    /// Only the first system message is kept and it is moved to the front.
    pub async fn seed_history(&self, messages: Vec<ProviderMessage>) {
        let max_len = self.effective_config().max_history_length;
        let seeded = trim_history(&keep_recent(&messages, messages.len()), max_len);
        *self.history.lock().await = seeded;
    }

    /// Run one turn. See the module docs for the steps.
    pub async fn execute(
        &self,
        command: AiCommand,
        params: &CommandParams,
        on_chunk: Option<&ChunkCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<AiResponse> {
        let config = self.effective_config();
        self.transport.validate(&config)?;
        let (system, user) = self.catalog.format_turn(command, params, self.name())?;

        // Held for the whole turn so concurrent turns on one adapter queue up.
        let mut history = self.history.lock().await;
        let context = window_history(&history, config.max_context_messages);
        let has_system = history.first().is_some_and(|m| m.is_system());

        let mut request = Vec::with_capacity(context.len() + 2);
        if !has_system {
            request.push(system.clone());
        }
        request.extend(context);
        request.push(user.clone());

        tracing::debug!(
            model = %self.model(),
            command = %command,
            history = history.len(),
            request = request.len(),
            "Executing turn"
        );

        let response = self
            .transport
            .call(&request, &config, on_chunk, cancel)
            .await?;

        if !has_system {
            history.insert(0, system);
        }
        history.push(user);
        history.push(ProviderMessage::assistant(response.text.clone()));
        *history = trim_history(&history, config.max_history_length);

        Ok(response)
    }
}
