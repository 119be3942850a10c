// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock provider transport for testing
//!
//! Provides a scripted implementation of the ProviderTransport trait that can
//! be used in tests without making real API calls. Clones share their script,
//! counters and recorded calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::EffectiveConfig;
use crate::error::{AibarError, ApiError, Result};
use crate::llm::message::ProviderMessage;
use crate::llm::provider::{AiResponse, ChunkCallback, ProviderTransport, TokenUsage};

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful reply with this text
    Text(String),
    /// Non-2xx provider response
    Status { status: u16, message: String },
    /// Connection-level failure
    Network(String),
}

/// A call the transport received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ProviderMessage>,
    pub config: EffectiveConfig,
    pub streamed: bool,
}

/// Holds a call open until the test releases it
#[derive(Debug, Default)]
pub struct MockGate {
    entered: Notify,
    release: Notify,
}

impl MockGate {
    /// Wait until a call has reached the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the waiting call continue
    pub fn open(&self) {
        self.release.notify_one();
    }
}

/// A mock transport for testing
#[derive(Clone)]
pub struct MockTransport {
    name: String,
    model: String,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    call_count: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<RecordedCall>>>,
    gate: Option<Arc<MockGate>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock transport lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            name: "Mock".to_string(),
            model: "mock-model".to_string(),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Report a different model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Queue a successful reply
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()));
        self
    }

    /// Queue several successful replies (returned in order)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        for text in texts {
            self.push(MockReply::Text(text));
        }
        self
    }

    /// Queue a provider error response
    pub fn with_failure(self, status: u16, message: impl Into<String>) -> Self {
        self.push(MockReply::Status {
            status,
            message: message.into(),
        });
        self
    }

    /// Hold every call at the gate until it is opened
    pub fn with_gate(mut self, gate: Arc<MockGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Append a reply to the script
    pub fn push(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Get the number of times call() was invoked
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded calls
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        lock(&self.recorded).clone()
    }

    /// Get the last call made
    pub fn last_call(&self) -> Option<RecordedCall> {
        lock(&self.recorded).last().cloned()
    }

    /// Once the script is exhausted every call answers "Mock response".
    fn next_reply(&self) -> MockReply {
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| MockReply::Text("Mock response".to_string()))
    }
}

#[async_trait]
impl ProviderTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn description(&self) -> String {
        format!("Mock model ({})", self.model)
    }

    fn validate(&self, _config: &EffectiveConfig) -> Result<()> {
        Ok(())
    }

    async fn call(
        &self,
        messages: &[ProviderMessage],
        config: &EffectiveConfig,
        on_chunk: Option<&ChunkCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<AiResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded).push(RecordedCall {
            messages: messages.to_vec(),
            config: config.clone(),
            streamed: on_chunk.is_some(),
        });

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled.into()),
                _ = gate.release.notified() => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled.into());
        }

        match self.next_reply() {
            MockReply::Text(text) => {
                if let Some(on_chunk) = on_chunk {
                    for chunk in text.chars().collect::<Vec<_>>().chunks(10) {
                        on_chunk(&chunk.iter().collect::<String>());
                    }
                }
                let prompt = messages.iter().map(|m| m.content.len() / 4).sum::<usize>();
                let completion = text.len() / 4;
                Ok(AiResponse::new(text)
                    .with_usage(TokenUsage::from_counts(prompt as u32, completion as u32)))
            }
            MockReply::Status { status, message } => Err(AibarError::Api(ApiError::Provider {
                provider: self.name.clone(),
                status,
                message,
            })),
            MockReply::Network(message) => Err(ApiError::Network(message).into()),
        }
    }
}
