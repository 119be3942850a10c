// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Undo/redo history for session deletions
//!
//! Two plain stacks held in memory only; nothing here is persisted.

use uuid::Uuid;

use super::model::Session;

/// Maximum number of deletions kept for undo
const MAX_UNDO_HISTORY: usize = 100;

/// A removed session and where it was
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedSession {
    pub session: Session,
    /// Position in the session list at deletion time
    pub index: usize,
    /// Whether it was the current session
    pub was_current: bool,
    /// Whether it was the placeholder left by an earlier delete
    pub was_placeholder: bool,
}

impl DeletedSession {
    pub fn id(&self) -> Uuid {
        self.session.id
    }
}

/// Undo/redo stacks for deleted sessions
#[derive(Debug, Default)]
pub struct DeletionHistory {
    /// Deleted sessions (for undo)
    undo_stack: Vec<DeletedSession>,
    /// Restored sessions (for redo)
    redo_stack: Vec<DeletedSession>,
}

impl DeletionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh deletion.
    /// This clears the redo stack (a new delete invalidates redo history)
    pub fn record(&mut self, deleted: DeletedSession) {
        self.push_undo(deleted);
        self.redo_stack.clear();
    }

    /// Push onto the undo stack without touching redo
    pub(crate) fn push_undo(&mut self, deleted: DeletedSession) {
        if self.undo_stack.len() >= MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
        self.undo_stack.push(deleted);
    }

    /// Take the most recent deletion and remember it for redo.
    pub fn undo(&mut self) -> Option<DeletedSession> {
        let deleted = self.undo_stack.pop()?;
        self.redo_stack.push(deleted.clone());
        Some(deleted)
    }

    /// Take the most recently undone deletion.
    /// The caller re-deletes it and records that via `push_undo`.
    pub fn redo(&mut self) -> Option<DeletedSession> {
        self.redo_stack.pop()
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get the number of undo states available
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of redo states available
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}
