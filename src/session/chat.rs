// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Async driver for a chat turn
//!
//! The store lock is only held to record the user message and the reply;
//! the provider call runs unlocked so the panel stays responsive.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::model::Message;
use super::store::{ChatRequest, SessionStore};
use crate::error::Result;
use crate::llm::provider::ChunkCallback;
use crate::llm::registry::ProviderRegistry;

/// How a `chat_with_ai` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Blank text or no current session; nothing happened
    Skipped,
    /// The assistant answered
    Replied(Message),
    /// The call failed; the message carries the error text
    Failed(Message),
    /// The session was deleted before the reply arrived
    Discarded,
}

fn lock(store: &Mutex<SessionStore>) -> MutexGuard<'_, SessionStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the busy flag if the turn future is dropped midway
struct TurnGuard {
    store: Arc<Mutex<SessionStore>>,
    armed: bool,
}

impl TurnGuard {
    fn new(store: Arc<Mutex<SessionStore>>) -> Self {
        Self { store, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Chat turn dropped before completion");
            lock(&self.store).abort_turn();
        }
    }
}

/// Called with the store locked whenever a turn changes it
pub type ChangeHook = dyn Fn(&SessionStore) + Send + Sync;

/// Session store plus provider registry
#[derive(Clone)]
pub struct ChatController {
    store: Arc<Mutex<SessionStore>>,
    registry: Arc<ProviderRegistry>,
    on_change: Option<Arc<ChangeHook>>,
}

impl ChatController {
    pub fn new(store: SessionStore, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            registry,
            on_change: None,
        }
    }

    /// Observe the user message and the reply being recorded
    pub fn with_change_hook(mut self, hook: Arc<ChangeHook>) -> Self {
        self.on_change = Some(hook);
        self
    }

    fn notify(&self, store: &SessionStore) {
        if let Some(hook) = &self.on_change {
            hook(store);
        }
    }

    /// Lock the store for a synchronous operation.
    /// Never hold the guard across an await.
    pub fn store(&self) -> MutexGuard<'_, SessionStore> {
        lock(&self.store)
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Send a message into the current session and record the reply.
    ///
    /// Provider failures are recorded as error messages and reported as
    /// [`TurnOutcome::Failed`]; only a rejected re-entrant send
    /// ([`crate::AibarError::Busy`]) or a storage failure returns `Err`.
    pub async fn chat_with_ai(
        &self,
        request: ChatRequest,
        on_chunk: Option<&ChunkCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let begun = {
            let mut store = self.store();
            let begun = store.begin_turn(&request)?;
            if begun.is_some() {
                self.notify(&store);
            }
            begun
        };
        let Some(turn) = begun else {
            return Ok(TurnOutcome::Skipped);
        };
        let guard = TurnGuard::new(Arc::clone(&self.store));

        tracing::debug!(session = %turn.session_id, model = %turn.model, command = %turn.command, "Chat turn started");
        let result = match self.registry.get_model(&turn.model) {
            Ok(adapter) => {
                adapter
                    .execute(turn.command, &turn.params, on_chunk, cancel)
                    .await
            }
            Err(e) => Err(e),
        };

        guard.disarm();
        let recorded = {
            let mut store = self.store();
            let recorded = store.complete_turn(&turn, result)?;
            self.notify(&store);
            recorded
        };
        Ok(match recorded {
            None => TurnOutcome::Discarded,
            Some(message) if message.is_error => TurnOutcome::Failed(message),
            Some(message) => TurnOutcome::Replied(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::error::AibarError;
    use crate::llm::mock_provider::{MockGate, MockTransport};
    use crate::llm::models::ModelFamily;
    use crate::llm::provider::ProviderTransport;
    use crate::session::model::MessageRole;
    use crate::session::storage::MemoryStorage;

    fn controller(mock: &MockTransport) -> ChatController {
        let mock = mock.clone();
        let registry = ProviderRegistry::with_factory(
            ConfigSource::default(),
            Box::new(
                move |model: &str, _family: ModelFamily| -> Box<dyn ProviderTransport> {
                    Box::new(mock.clone().with_model(model))
                },
            ),
        );
        let store = SessionStore::open(Box::new(MemoryStorage::new()), "gpt-4").unwrap();
        ChatController::new(store, Arc::new(registry))
    }

    #[tokio::test]
    async fn test_reply_is_recorded() {
        let mock = MockTransport::new().with_response("Use fold instead.");
        let chat = controller(&mock);

        let outcome = chat
            .chat_with_ai(
                ChatRequest::new("How do I sum this?", "gpt-4"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let TurnOutcome::Replied(message) = outcome else {
            panic!("expected a reply, got {:?}", outcome);
        };
        assert_eq!(message.text, "Use fold instead.");
        let store = chat.store();
        let messages = &store.current_session().unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(!store.is_typing());
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_message() {
        let mock = MockTransport::new().with_failure(401, "Incorrect API key provided");
        let chat = controller(&mock);

        let outcome = chat
            .chat_with_ai(ChatRequest::new("hi", "gpt-4"), None, &CancellationToken::new())
            .await
            .unwrap();
        let TurnOutcome::Failed(message) = outcome else {
            panic!("expected a failure, got {:?}", outcome);
        };
        assert_eq!(message.text, "Mock API error: Incorrect API key provided");

        let store = chat.store();
        let messages = &store.current_session().unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.iter().filter(|m| m.is_error).count(), 1);
        assert!(!store.is_typing());
    }

    #[tokio::test]
    async fn test_unsupported_model_is_reported_in_session() {
        let mock = MockTransport::new();
        let chat = controller(&mock);

        let outcome = chat
            .chat_with_ai(ChatRequest::new("hi", "gpt-2"), None, &CancellationToken::new())
            .await
            .unwrap();
        let TurnOutcome::Failed(message) = outcome else {
            panic!("expected a failure, got {:?}", outcome);
        };
        assert_eq!(message.text, "Unsupported model: gpt-2");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_message_is_skipped() {
        let mock = MockTransport::new();
        let chat = controller(&mock);
        let outcome = chat
            .chat_with_ai(ChatRequest::new("   ", "gpt-4"), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Skipped);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_second_send_while_outstanding_is_rejected() {
        let gate = Arc::new(MockGate::default());
        let mock = MockTransport::new()
            .with_response("first reply")
            .with_gate(Arc::clone(&gate));
        let chat = controller(&mock);

        let first = {
            let chat = chat.clone();
            tokio::spawn(async move {
                chat.chat_with_ai(
                    ChatRequest::new("first", "gpt-4"),
                    None,
                    &CancellationToken::new(),
                )
                .await
            })
        };
        gate.entered().await;
        assert!(chat.store().is_typing());

        let second = chat
            .chat_with_ai(ChatRequest::new("second", "gpt-4"), None, &CancellationToken::new())
            .await;
        assert!(matches!(second, Err(AibarError::Busy)));

        gate.open();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, TurnOutcome::Replied(_)));

        let store = chat.store();
        let texts: Vec<&str> = store
            .current_session()
            .unwrap()
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "first reply"]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_turn_clears_typing() {
        let gate = Arc::new(MockGate::default());
        let mock = MockTransport::new().with_gate(Arc::clone(&gate));
        let chat = controller(&mock);
        let cancel = CancellationToken::new();

        let task = {
            let chat = chat.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                chat.chat_with_ai(ChatRequest::new("long one", "gpt-4"), None, &cancel)
                    .await
            })
        };
        gate.entered().await;
        cancel.cancel();

        let outcome = task.await.unwrap().unwrap();
        let TurnOutcome::Failed(message) = outcome else {
            panic!("expected a failure, got {:?}", outcome);
        };
        assert_eq!(message.text, "Request cancelled");
        assert!(!chat.store().is_typing());
    }

    #[tokio::test]
    async fn test_dropped_turn_clears_typing() {
        let gate = Arc::new(MockGate::default());
        let mock = MockTransport::new().with_gate(Arc::clone(&gate));
        let chat = controller(&mock);

        let task = {
            let chat = chat.clone();
            tokio::spawn(async move {
                chat.chat_with_ai(
                    ChatRequest::new("never answered", "gpt-4"),
                    None,
                    &CancellationToken::new(),
                )
                .await
            })
        };
        gate.entered().await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let store = chat.store();
        assert!(!store.is_typing());
        assert_eq!(store.current_session().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_change_hook_sees_both_halves_of_turn() {
        let mock = MockTransport::new().with_response("ok");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let chat = controller(&mock).with_change_hook(Arc::new(move |store: &SessionStore| {
            let count = store.current_session().map_or(0, |s| s.messages.len());
            record.lock().unwrap().push((count, store.is_typing()));
        }));

        chat.chat_with_ai(ChatRequest::new("hi", "gpt-4"), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, true), (2, false)]);
    }

    #[tokio::test]
    async fn test_streamed_chunks_reach_callback() {
        let mock = MockTransport::new().with_response("a streamed answer that is long");
        let chat = controller(&mock);
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        let on_chunk = move |chunk: &str| sink.lock().unwrap().push(chunk.to_string());

        chat.chat_with_ai(
            ChatRequest::new("stream please", "gpt-4"),
            Some(&on_chunk),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let joined: String = chunks.lock().unwrap().concat();
        assert_eq!(joined, "a streamed answer that is long");
        assert!(mock.last_call().unwrap().streamed);
    }

    #[tokio::test]
    async fn test_stream_into_borrowed_buffer() {
        let mock = MockTransport::new().with_response("borrowed, not owned");
        let chat = controller(&mock);
        let transcript = Mutex::new(String::new());
        let on_chunk = |chunk: &str| transcript.lock().unwrap().push_str(chunk);

        let outcome = chat
            .chat_with_ai(
                ChatRequest::new("stream please", "gpt-4"),
                Some(&on_chunk),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Replied(_)));
        assert_eq!(*transcript.lock().unwrap(), "borrowed, not owned");
    }
}
