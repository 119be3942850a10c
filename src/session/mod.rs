// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation sessions
//!
//! Sessions are persisted as one JSON blob. Deletions can be undone while
//! the process lives; the undo/redo stacks are never written out.

pub mod chat;
pub mod grouping;
pub mod model;
pub mod storage;
pub mod store;
pub mod undo;

pub use chat::{ChatController, TurnOutcome};
pub use grouping::{group_sessions, relative_time, RecencyBand, SessionGroup};
pub use model::{derive_title, Message, MessageRole, Session, DEFAULT_TITLE};
pub use storage::{JsonFileStorage, MemoryStorage, PersistedState, StateStorage};
pub use store::{ChatRequest, PendingTurn, SessionStore};
pub use undo::{DeletedSession, DeletionHistory};
