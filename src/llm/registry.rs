// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider registry
//!
//! Resolves a model identifier to a cached [`ProviderAdapter`]. Adapters are
//! built once per model; later configuration changes are pushed into the
//! live adapters so their history survives a settings change. The registry
//! holds exactly one subscription on the [`ConfigSource`] and releases it on
//! [`ProviderRegistry::dispose`] or drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::chat::engine::ProviderAdapter;
use crate::config::{AiSettings, ConfigSource, Settings, Subscription};
use crate::error::{AibarError, Result};
use crate::llm::models::ModelFamily;
use crate::llm::provider::ProviderTransport;
use crate::llm::providers::{ClaudeClient, OpenAiClient};

/// Builds the transport for a classified model
pub type TransportFactory = dyn Fn(&str, ModelFamily) -> Box<dyn ProviderTransport> + Send + Sync;

type AdapterMap = Arc<Mutex<HashMap<String, Arc<ProviderAdapter>>>>;

fn lock(adapters: &AdapterMap) -> MutexGuard<'_, HashMap<String, Arc<ProviderAdapter>>> {
    adapters
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Factory for provider transports
pub struct ProviderFactory;

impl ProviderFactory {
    /// Transport for the vendor's public endpoint
    pub fn create(model: &str, family: ModelFamily) -> Box<dyn ProviderTransport> {
        match family {
            ModelFamily::OpenAi => Box::new(OpenAiClient::new(model)),
            ModelFamily::Claude => Box::new(ClaudeClient::new(model)),
        }
    }

    /// Factory honoring the endpoint overrides in the settings file
    pub fn from_settings(settings: &Settings) -> Box<TransportFactory> {
        let openai_url = settings.providers.openai.base_url.clone();
        let anthropic_url = settings.providers.anthropic.base_url.clone();
        Box::new(
            move |model: &str, family: ModelFamily| -> Box<dyn ProviderTransport> {
                match family {
                    ModelFamily::OpenAi => match &openai_url {
                        Some(url) => Box::new(OpenAiClient::with_base_url(model, url)),
                        None => Box::new(OpenAiClient::new(model)),
                    },
                    ModelFamily::Claude => match &anthropic_url {
                        Some(url) => Box::new(ClaudeClient::with_base_url(model, url)),
                        None => Box::new(ClaudeClient::new(model)),
                    },
                }
            },
        )
    }
}

/// Cache of provider adapters keyed by model identifier
pub struct ProviderRegistry {
    adapters: AdapterMap,
    source: ConfigSource,
    factory: Box<TransportFactory>,
    overrides: HashMap<String, AiSettings>,
    subscription: Mutex<Option<Subscription>>,
}

impl ProviderRegistry {
    /// Registry using the vendors' public endpoints
    pub fn new(source: ConfigSource) -> Self {
        Self::with_factory(source, Box::new(ProviderFactory::create))
    }

    /// Registry with a custom transport factory
    pub fn with_factory(source: ConfigSource, factory: Box<TransportFactory>) -> Self {
        let adapters: AdapterMap = Arc::new(Mutex::new(HashMap::new()));

        let listener_adapters = Arc::clone(&adapters);
        let subscription = source.subscribe(move |settings: &AiSettings| {
            let live: Vec<Arc<ProviderAdapter>> = lock(&listener_adapters).values().cloned().collect();
            for adapter in live {
                adapter.update_config(settings.clone());
            }
        });

        Self {
            adapters,
            source,
            factory,
            overrides: HashMap::new(),
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Model-specific settings applied when the adapter is first built
    pub fn with_model_overrides(mut self, model: impl Into<String>, overrides: AiSettings) -> Self {
        self.overrides.insert(model.into(), overrides);
        self
    }

    /// Adapter for a model, built on first access.
    pub fn get_model(&self, model: &str) -> Result<Arc<ProviderAdapter>> {
        let mut adapters = lock(&self.adapters);
        if let Some(adapter) = adapters.get(model) {
            return Ok(Arc::clone(adapter));
        }

        let family =
            ModelFamily::of(model).ok_or_else(|| AibarError::UnsupportedModel(model.to_string()))?;
        let transport = (self.factory)(model, family);
        let adapter = Arc::new(
            ProviderAdapter::new(transport, self.source.current())
                .with_overrides(self.overrides.get(model).cloned().unwrap_or_default()),
        );

        tracing::debug!(model, provider = family.provider_name(), "Created provider adapter");
        adapters.insert(model.to_string(), Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Model identifiers with a live adapter
    pub fn cached_models(&self) -> Vec<String> {
        let mut models: Vec<String> = lock(&self.adapters).keys().cloned().collect();
        models.sort();
        models
    }

    /// Drop every adapter's rolling history
    pub async fn clear_histories(&self) {
        let adapters: Vec<Arc<ProviderAdapter>> = lock(&self.adapters).values().cloned().collect();
        for adapter in adapters {
            adapter.clear_history().await;
        }
    }

    pub fn config_source(&self) -> &ConfigSource {
        &self.source
    }

    /// Stop following configuration changes. Idempotent.
    pub fn dispose(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if subscription.is_some() {
            tracing::debug!("Provider registry disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}
