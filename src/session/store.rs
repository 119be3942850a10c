// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session store
//!
//! Owns every conversation thread, the current-session pointer, the
//! deletion undo/redo stacks and the attachments for the next message.
//! Every mutation is written through to [`StateStorage`].
//!
//! A chat turn is split in two so the provider call can run without holding
//! the store: [`SessionStore::begin_turn`] appends the user message and marks
//! the store busy, [`SessionStore::complete_turn`] records the reply (or the
//! error) and clears the busy flag.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::grouping::{group_sessions, SessionGroup};
use super::model::{derive_title, Message, Session};
use super::storage::{PersistedState, StateStorage};
use super::undo::{DeletedSession, DeletionHistory};
use crate::attachments::AttachmentSet;
use crate::chat::prompts::{AiCommand, CommandParams};
use crate::error::{AibarError, Result};
use crate::llm::models::ModelFamily;
use crate::llm::provider::AiResponse;

/// What the caller wants to send
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub text: String,
    pub model: String,
    pub command: AiCommand,
    /// Code selection sent ahead of the message
    pub code: Option<String>,
    pub images: Vec<String>,
}

impl ChatRequest {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            command: AiCommand::Chat,
            code: None,
            images: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: AiCommand) -> Self {
        self.command = command;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// A turn whose user message is recorded and whose reply is outstanding
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub session_id: Uuid,
    pub model: String,
    pub command: AiCommand,
    pub params: CommandParams,
}

/// Conversation threads plus everything the panel needs around them
pub struct SessionStore {
    sessions: Vec<Session>,
    current_session_id: Option<Uuid>,
    selected_model: String,
    deletions: DeletionHistory,
    attachments: AttachmentSet,
    is_typing: bool,
    /// Session materialized because a delete emptied the store
    placeholder: Option<Uuid>,
    storage: Box<dyn StateStorage>,
}

impl SessionStore {
    /// Rehydrate from storage. An empty or missing state gets one fresh
    /// session, which becomes current.
    pub fn open(storage: Box<dyn StateStorage>, default_model: &str) -> Result<Self> {
        let state = storage.load()?.unwrap_or_default();
        let selected_model = state
            .selected_model
            .filter(|m| ModelFamily::of(m).is_some())
            .unwrap_or_else(|| default_model.to_string());

        let mut store = Self {
            sessions: state.sessions,
            current_session_id: state.current_session_id,
            selected_model,
            deletions: DeletionHistory::new(),
            attachments: AttachmentSet::new(),
            is_typing: false,
            placeholder: None,
            storage,
        };

        if store.sessions.is_empty() {
            tracing::debug!("No stored sessions, starting a new chat");
            store.insert_fresh_session();
            store.persist()?;
        } else if store.current_index().is_none() {
            store.current_session_id = store.most_recent_id();
            store.persist()?;
        }

        tracing::debug!(sessions = store.sessions.len(), "Session store opened");
        Ok(store)
    }

    fn persist(&self) -> Result<()> {
        self.storage.save(&self.snapshot())
    }

    /// The blob written to storage
    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            sessions: self.sessions.clone(),
            current_session_id: self.current_session_id,
            selected_model: Some(self.selected_model.clone()),
        }
    }

    fn index_of(&self, id: Uuid) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn current_index(&self) -> Option<usize> {
        self.current_session_id.and_then(|id| self.index_of(id))
    }

    fn most_recent_id(&self) -> Option<Uuid> {
        self.sessions
            .iter()
            .max_by_key(|s| s.last_updated_at)
            .map(|s| s.id)
    }

    fn insert_fresh_session(&mut self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.sessions.insert(0, session);
        self.current_session_id = Some(id);
        id
    }

    /// Start a new chat and make it current.
    pub fn create_new_chat(&mut self) -> Result<Uuid> {
        let id = self.insert_fresh_session();
        tracing::debug!(session = %id, "Created new chat");
        self.persist()?;
        Ok(id)
    }

    /// Make `id` current. Unknown ids are ignored.
    pub fn select_session(&mut self, id: Uuid) -> Result<bool> {
        if self.index_of(id).is_none() {
            tracing::debug!(session = %id, "Ignoring selection of unknown session");
            return Ok(false);
        }
        if self.current_session_id == Some(id) {
            return Ok(true);
        }
        self.current_session_id = Some(id);
        self.persist()?;
        Ok(true)
    }

    /// Set a session title. Blank titles and unknown ids are ignored.
    pub fn rename_session(&mut self, id: Uuid, title: &str) -> Result<bool> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(false);
        }
        let Some(index) = self.index_of(id) else {
            return Ok(false);
        };
        self.sessions[index].title = title.to_string();
        self.persist()?;
        Ok(true)
    }

    /// Remove a session and push it onto the undo stack.
    pub fn delete_session(&mut self, id: Uuid) -> Result<bool> {
        let Some(deleted) = self.remove_session(id) else {
            return Ok(false);
        };
        tracing::debug!(session = %id, index = deleted.index, "Deleted session");
        self.deletions.record(deleted);
        self.persist()?;
        Ok(true)
    }

    /// Take a session out of the list and fix up the current pointer.
    fn remove_session(&mut self, id: Uuid) -> Option<DeletedSession> {
        let index = self.index_of(id)?;
        let was_current = self.current_session_id == Some(id);
        let session = self.sessions.remove(index);
        let was_placeholder = self.placeholder == Some(id);
        if was_placeholder {
            self.placeholder = None;
        }

        if was_current {
            self.current_session_id = self.most_recent_id();
        }
        if self.sessions.is_empty() {
            let placeholder = self.insert_fresh_session();
            self.placeholder = Some(placeholder);
        }

        Some(DeletedSession {
            session,
            index,
            was_current,
            was_placeholder,
        })
    }

    /// Drop the placeholder session if nobody used it.
    fn discard_placeholder(&mut self) {
        let Some(id) = self.placeholder.take() else {
            return;
        };
        let Some(index) = self.index_of(id) else {
            return;
        };
        let pristine = {
            let session = &self.sessions[index];
            session.messages.is_empty() && session.has_default_title()
        };
        if pristine {
            self.sessions.remove(index);
            if self.current_session_id == Some(id) {
                self.current_session_id = None;
            }
        }
    }

    /// Restore the most recently deleted session where it was.
    pub fn undo_delete(&mut self) -> Result<Option<Uuid>> {
        let Some(deleted) = self.deletions.undo() else {
            return Ok(None);
        };
        self.discard_placeholder();

        let id = deleted.id();
        let index = deleted.index.min(self.sessions.len());
        self.sessions.insert(index, deleted.session);
        if deleted.was_current || self.current_index().is_none() {
            self.current_session_id = Some(id);
        }
        if deleted.was_placeholder {
            self.placeholder = Some(id);
        }

        tracing::debug!(session = %id, index, "Restored session");
        self.persist()?;
        Ok(Some(id))
    }

    /// Delete again the most recently restored session.
    pub fn redo_delete(&mut self) -> Result<Option<Uuid>> {
        let Some(restored) = self.deletions.redo() else {
            return Ok(None);
        };
        let id = restored.id();
        let Some(deleted) = self.remove_session(id) else {
            tracing::debug!(session = %id, "Session to redo is gone, skipping");
            return Ok(None);
        };
        self.deletions.push_undo(deleted);
        self.persist()?;
        Ok(Some(id))
    }

    pub fn can_undo(&self) -> bool {
        self.deletions.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.deletions.can_redo()
    }

    /// Sessions matching `query`, bucketed by recency
    pub fn grouped_sessions(&self, query: &str) -> Vec<SessionGroup<'_>> {
        self.grouped_sessions_at(query, Utc::now())
    }

    pub fn grouped_sessions_at(&self, query: &str, now: DateTime<Utc>) -> Vec<SessionGroup<'_>> {
        group_sessions(&self.sessions, query, now)
    }

    /// Remember the model for the next turn.
    pub fn set_selected_model(&mut self, model: &str) -> Result<()> {
        if ModelFamily::of(model).is_none() {
            return Err(AibarError::UnsupportedModel(model.to_string()));
        }
        if self.selected_model != model {
            self.selected_model = model.to_string();
            self.persist()?;
        }
        Ok(())
    }

    /// Wipe sessions, undo/redo and attachments, then start one fresh
    /// session. The selected model is kept.
    pub fn clear_all(&mut self) -> Result<Uuid> {
        self.sessions.clear();
        self.deletions.clear();
        self.attachments.clear();
        self.placeholder = None;
        let id = self.insert_fresh_session();
        tracing::debug!("Cleared all sessions");
        self.persist()?;
        Ok(id)
    }

    /// Record the user side of a turn.
    ///
    /// Returns `None` for blank text or when there is no current session,
    /// and [`AibarError::Busy`] while another turn is outstanding. Pending
    /// attachments are moved into the turn.
    pub fn begin_turn(&mut self, request: &ChatRequest) -> Result<Option<PendingTurn>> {
        let text = request.text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let Some(index) = self.current_index() else {
            return Ok(None);
        };
        if self.is_typing {
            tracing::warn!("Rejected send while a reply is outstanding");
            return Err(AibarError::Busy);
        }

        let session = &mut self.sessions[index];
        if session.has_default_title() {
            session.title = derive_title(text);
        }
        session.push(Message::user(text));
        let session_id = session.id;
        self.is_typing = true;

        let files = self
            .attachments
            .take()
            .iter()
            .map(|f| f.to_context())
            .collect();
        let params = CommandParams {
            message: text.to_string(),
            code: request.code.clone(),
            files,
            images: request.images.clone(),
            ..Default::default()
        };

        if let Err(e) = self.persist() {
            self.is_typing = false;
            return Err(e);
        }

        Ok(Some(PendingTurn {
            session_id,
            model: request.model.clone(),
            command: request.command,
            params,
        }))
    }

    /// Record the outcome of a turn and clear the busy flag.
    ///
    /// Failures become an assistant message flagged as an error. Returns
    /// `None` when the session was deleted while the reply was outstanding.
    pub fn complete_turn(
        &mut self,
        turn: &PendingTurn,
        result: Result<AiResponse>,
    ) -> Result<Option<Message>> {
        self.is_typing = false;

        let message = match result {
            Ok(response) => Message::assistant(response.text),
            Err(e) => {
                tracing::debug!(session = %turn.session_id, error = %e, "Turn failed");
                Message::error(e.to_string())
            }
        };

        let Some(index) = self.index_of(turn.session_id) else {
            tracing::warn!(session = %turn.session_id, "Session deleted before the reply arrived");
            return Ok(None);
        };
        self.sessions[index].push(message.clone());
        self.persist()?;
        Ok(Some(message))
    }

    /// Clear the busy flag without recording anything.
    pub fn abort_turn(&mut self) {
        self.is_typing = false;
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn current_session_id(&self) -> Option<Uuid> {
        self.current_session_id
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current_index().map(|i| &self.sessions[i])
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn attachments(&self) -> &AttachmentSet {
        &self.attachments
    }

    /// Attachments are not persisted, so changes need no write.
    pub fn attachments_mut(&mut self) -> &mut AttachmentSet {
        &mut self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::AttachedFile;
    use crate::error::ApiError;
    use crate::session::model::{MessageRole, DEFAULT_TITLE};
    use crate::session::storage::MemoryStorage;
    use chrono::Duration;

    fn open_store() -> (SessionStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = SessionStore::open(Box::new(storage.clone()), "gpt-4").unwrap();
        (store, storage)
    }

    /// Store with `n` sessions, each updated a minute apart, first one newest
    fn store_with(n: usize) -> SessionStore {
        let now = Utc::now();
        let sessions: Vec<Session> = (0..n)
            .map(|i| {
                let mut s = Session::new();
                s.title = format!("s{}", i);
                s.last_updated_at = now - Duration::minutes(i as i64);
                s
            })
            .collect();
        let state = PersistedState {
            current_session_id: sessions.first().map(|s| s.id),
            sessions,
            selected_model: None,
        };
        SessionStore::open(Box::new(MemoryStorage::with_state(state)), "gpt-4").unwrap()
    }

    fn ids(store: &SessionStore) -> Vec<Uuid> {
        store.sessions().iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_open_empty_creates_default_session() {
        let (store, storage) = open_store();
        assert_eq!(store.sessions().len(), 1);
        let current = store.current_session().unwrap();
        assert_eq!(current.title, DEFAULT_TITLE);
        assert!(current.messages.is_empty());
        assert_eq!(storage.snapshot().unwrap().sessions.len(), 1);
        assert_eq!(store.selected_model(), "gpt-4");
    }

    #[test]
    fn test_open_repairs_dangling_current_pointer() {
        let mut old = Session::new();
        old.last_updated_at = Utc::now() - Duration::hours(1);
        let recent = Session::new();
        let recent_id = recent.id;
        let state = PersistedState {
            sessions: vec![old, recent],
            current_session_id: Some(Uuid::new_v4()),
            selected_model: Some("not-a-model".to_string()),
        };
        let store = SessionStore::open(Box::new(MemoryStorage::with_state(state)), "gpt-4o").unwrap();
        assert_eq!(store.current_session_id(), Some(recent_id));
        assert_eq!(store.selected_model(), "gpt-4o");
    }

    #[test]
    fn test_create_new_chat_becomes_current() {
        let (mut store, _) = open_store();
        let id = store.create_new_chat().unwrap();
        assert_eq!(store.current_session_id(), Some(id));
        assert_eq!(store.sessions()[0].id, id);
        assert_eq!(store.sessions().len(), 2);
    }

    #[test]
    fn test_select_unknown_session_is_ignored() {
        let (mut store, _) = open_store();
        let current = store.current_session_id();
        assert!(!store.select_session(Uuid::new_v4()).unwrap());
        assert_eq!(store.current_session_id(), current);
    }

    #[test]
    fn test_rename_session() {
        let (mut store, storage) = open_store();
        let id = store.current_session_id().unwrap();
        assert!(store.rename_session(id, "  Parser work ").unwrap());
        assert_eq!(store.session(id).unwrap().title, "Parser work");
        assert!(!store.rename_session(id, "   ").unwrap());
        assert!(!store.rename_session(Uuid::new_v4(), "x").unwrap());
        assert_eq!(storage.snapshot().unwrap().sessions[0].title, "Parser work");
    }

    #[test]
    fn test_delete_current_selects_most_recent_remaining() {
        let mut store = store_with(3);
        let all = ids(&store);
        store.select_session(all[1]).unwrap();
        store.delete_session(all[1]).unwrap();
        // s0 is the newest of the rest
        assert_eq!(store.current_session_id(), Some(all[0]));
        assert!(store.can_undo());
    }

    #[test]
    fn test_delete_then_undo_restores_exact_state() {
        let mut store = store_with(4);
        let before = store.snapshot();
        let all = ids(&store);

        store.delete_session(all[0]).unwrap();
        store.delete_session(all[2]).unwrap();
        store.undo_delete().unwrap();
        store.undo_delete().unwrap();

        assert_eq!(store.snapshot(), before);
        assert!(!store.can_undo());
        assert!(store.can_redo());
    }

    #[test]
    fn test_deleting_last_session_materializes_placeholder() {
        let mut store = store_with(1);
        let before = store.snapshot();
        let only = ids(&store)[0];

        store.delete_session(only).unwrap();
        assert_eq!(store.sessions().len(), 1);
        let placeholder = store.current_session().unwrap();
        assert_ne!(placeholder.id, only);
        assert_eq!(placeholder.title, DEFAULT_TITLE);

        store.undo_delete().unwrap();
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_deleting_placeholder_then_undoing_both() {
        let mut store = store_with(1);
        let before = store.snapshot();
        let only = ids(&store)[0];

        store.delete_session(only).unwrap();
        let placeholder = store.current_session_id().unwrap();
        store.delete_session(placeholder).unwrap();
        assert_eq!(store.sessions().len(), 1);
        assert_ne!(store.current_session_id(), Some(placeholder));

        assert_eq!(store.undo_delete().unwrap(), Some(placeholder));
        assert_eq!(ids(&store), vec![placeholder]);
        assert_eq!(store.undo_delete().unwrap(), Some(only));
        assert_eq!(store.snapshot(), before);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_used_placeholder_survives_undo() {
        let mut store = store_with(1);
        let only = ids(&store)[0];
        store.delete_session(only).unwrap();
        let placeholder = store.current_session_id().unwrap();
        store.rename_session(placeholder, "kept").unwrap();

        store.undo_delete().unwrap();
        assert_eq!(store.sessions().len(), 2);
        assert_eq!(store.current_session_id(), Some(only));
        assert!(store.session(placeholder).is_some());
    }

    #[test]
    fn test_undo_redo_undo_is_stable() {
        let mut store = store_with(3);
        let before = store.snapshot();
        let target = ids(&store)[1];

        store.delete_session(target).unwrap();
        let after_delete = store.snapshot();

        assert_eq!(store.undo_delete().unwrap(), Some(target));
        assert_eq!(store.redo_delete().unwrap(), Some(target));
        assert_eq!(store.snapshot(), after_delete);
        assert_eq!(store.undo_delete().unwrap(), Some(target));
        assert_eq!(store.snapshot(), before);

        assert!(store.undo_delete().unwrap().is_none());
    }

    #[test]
    fn test_new_delete_clears_redo() {
        let mut store = store_with(3);
        let all = ids(&store);
        store.delete_session(all[0]).unwrap();
        store.undo_delete().unwrap();
        assert!(store.can_redo());
        store.delete_session(all[2]).unwrap();
        assert!(!store.can_redo());
        assert!(store.redo_delete().unwrap().is_none());
    }

    #[test]
    fn test_first_message_sets_title_once() {
        let (mut store, _) = open_store();
        let request = ChatRequest::new("Refactor this loop to use a reduce function please", "gpt-4");
        let turn = store.begin_turn(&request).unwrap().unwrap();
        store
            .complete_turn(&turn, Ok(AiResponse::new("Sure")))
            .unwrap();
        assert_eq!(store.current_session().unwrap().title, "Refactor this loop...");

        let turn = store
            .begin_turn(&ChatRequest::new("And now make it faster", "gpt-4"))
            .unwrap()
            .unwrap();
        store.complete_turn(&turn, Ok(AiResponse::new("Done"))).unwrap();
        let session = store.current_session().unwrap();
        assert_eq!(session.title, "Refactor this loop...");
        assert_eq!(session.messages.len(), 4);
    }

    #[test]
    fn test_blank_text_is_ignored() {
        let (mut store, _) = open_store();
        assert!(store.begin_turn(&ChatRequest::new("  \n", "gpt-4")).unwrap().is_none());
        assert!(!store.is_typing());
        assert!(store.current_session().unwrap().messages.is_empty());
    }

    #[test]
    fn test_second_begin_while_typing_is_rejected() {
        let (mut store, _) = open_store();
        let turn = store
            .begin_turn(&ChatRequest::new("first", "gpt-4"))
            .unwrap()
            .unwrap();
        assert!(store.is_typing());

        let err = store.begin_turn(&ChatRequest::new("second", "gpt-4")).unwrap_err();
        assert!(matches!(err, AibarError::Busy));
        assert_eq!(store.current_session().unwrap().messages.len(), 1);

        store.complete_turn(&turn, Ok(AiResponse::new("ok"))).unwrap();
        assert!(!store.is_typing());
    }

    #[test]
    fn test_failed_turn_appends_one_error_message() {
        let (mut store, _) = open_store();
        let turn = store
            .begin_turn(&ChatRequest::new("hello", "gpt-4"))
            .unwrap()
            .unwrap();
        let failure = AibarError::Api(ApiError::Provider {
            provider: "OpenAI".to_string(),
            status: 401,
            message: "Incorrect API key provided".to_string(),
        });
        let message = store.complete_turn(&turn, Err(failure)).unwrap().unwrap();

        assert!(message.is_error);
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.text, "OpenAI API error: Incorrect API key provided");
        let messages = &store.current_session().unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert!(!store.is_typing());
    }

    #[test]
    fn test_reply_for_deleted_session_is_dropped() {
        let (mut store, _) = open_store();
        let turn = store
            .begin_turn(&ChatRequest::new("hello", "gpt-4"))
            .unwrap()
            .unwrap();
        store.delete_session(turn.session_id).unwrap();
        assert!(store
            .complete_turn(&turn, Ok(AiResponse::new("late")))
            .unwrap()
            .is_none());
        assert!(!store.is_typing());
    }

    #[test]
    fn test_begin_turn_takes_attachments() {
        let (mut store, _) = open_store();
        store
            .attachments_mut()
            .attach(AttachedFile::file("lib.rs", "src/lib.rs", "pub mod a;"));
        let request = ChatRequest::new("explain", "gpt-4")
            .with_command(AiCommand::ExplainCode)
            .with_code("fn a() {}");
        let turn = store.begin_turn(&request).unwrap().unwrap();

        assert!(store.attachments().is_empty());
        assert_eq!(turn.params.files.len(), 1);
        assert_eq!(turn.params.files[0].name, "lib.rs");
        assert_eq!(turn.params.code.as_deref(), Some("fn a() {}"));
        assert_eq!(turn.command, AiCommand::ExplainCode);
    }

    #[test]
    fn test_set_selected_model() {
        let (mut store, storage) = open_store();
        store.set_selected_model("claude-3.5-sonnet").unwrap();
        assert_eq!(
            storage.snapshot().unwrap().selected_model.as_deref(),
            Some("claude-3.5-sonnet")
        );
        assert!(matches!(
            store.set_selected_model("gpt-2"),
            Err(AibarError::UnsupportedModel(_))
        ));
        assert_eq!(store.selected_model(), "claude-3.5-sonnet");
    }

    #[test]
    fn test_clear_all_keeps_selected_model() {
        let mut store = store_with(3);
        store.set_selected_model("gpt-4o").unwrap();
        let first = ids(&store)[0];
        store.delete_session(first).unwrap();
        store
            .attachments_mut()
            .attach(AttachedFile::file("a", "a.rs", ""));

        let id = store.clear_all().unwrap();
        assert_eq!(ids(&store), vec![id]);
        assert_eq!(store.current_session_id(), Some(id));
        assert!(!store.can_undo());
        assert!(store.attachments().is_empty());
        assert_eq!(store.selected_model(), "gpt-4o");
    }

    #[test]
    fn test_persisted_state_round_trips() {
        let mut store = store_with(2);
        let turn = store
            .begin_turn(&ChatRequest::new("hello there", "gpt-4"))
            .unwrap()
            .unwrap();
        store.complete_turn(&turn, Ok(AiResponse::new("hi"))).unwrap();
        let saved = store.snapshot();

        let reopened =
            SessionStore::open(Box::new(MemoryStorage::with_state(saved.clone())), "gpt-4").unwrap();
        assert_eq!(reopened.snapshot(), saved);
    }
}
