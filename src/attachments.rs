// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Context attachments for the next outgoing message
//!
//! Files and pasted snippets get a fresh identity when attached, so the same
//! path can be attached twice with different line ranges. Attachments are
//! removed explicitly or when their file is deleted on disk (matched by path).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::prompts::FileContext;

/// What an attachment was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    File,
    Snippet,
}

/// A file or snippet bound to the next message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedFile {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

impl AttachedFile {
    /// Whole-file attachment
    pub fn file(name: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path: Some(path.into()),
            kind: AttachmentKind::File,
            content: content.into(),
            start_line: None,
            end_line: None,
        }
    }

    /// Snippet attachment, optionally tied to a source range
    pub fn snippet(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path: None,
            kind: AttachmentKind::Snippet,
            content: content.into(),
            start_line: None,
            end_line: None,
        }
    }

    pub fn with_range(mut self, path: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        self.path = Some(path.into());
        self.start_line = Some(start_line);
        self.end_line = Some(end_line);
        self
    }

    /// As sent to the provider
    pub fn to_context(&self) -> FileContext {
        FileContext {
            name: self.name.clone(),
            content: self.content.clone(),
        }
    }
}

/// Active editor selection, 1-based inclusive lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSelection {
    pub file_name: String,
    pub full_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// Heuristic for pasted text that should become a snippet: multi-line, or
/// containing punctuation rarely seen in prose.
pub fn looks_like_code(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if text.contains('\n') {
        return true;
    }
    const MARKERS: &[&str] = &["{", "}", ";", "=>", "->", "::", "()", "[]", "==", "&&", "||"];
    MARKERS.iter().any(|m| text.contains(m))
}

/// Snippet for pasted text, named after the active selection when known.
/// `None` when the text reads like prose and should be inserted as is.
pub fn snippet_from_paste(text: &str, selection: Option<&EditorSelection>) -> Option<AttachedFile> {
    if !looks_like_code(text) {
        return None;
    }
    let snippet = match selection {
        Some(sel) => AttachedFile::snippet(
            format!("{}:{}-{}", sel.file_name, sel.start_line, sel.end_line),
            text,
        )
        .with_range(&sel.full_path, sel.start_line, sel.end_line),
        None => AttachedFile::snippet("Pasted snippet", text),
    };
    Some(snippet)
}

/// Attachments for the message being composed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSet {
    files: Vec<AttachedFile>,
    selected: Option<Uuid>,
}

impl AttachmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add with a fresh identity. Paths are not deduplicated here; use
    /// [`AttachmentSet::contains_path`] first when that matters.
    pub fn attach(&mut self, mut file: AttachedFile) -> Uuid {
        file.id = Uuid::new_v4();
        let id = file.id;
        tracing::debug!(name = %file.name, kind = ?file.kind, "Attached context");
        self.files.push(file);
        id
    }

    pub fn remove(&mut self, id: Uuid) -> Option<AttachedFile> {
        let pos = self.files.iter().position(|f| f.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.files.remove(pos))
    }

    /// Drop every attachment of a deleted file. Returns how many went.
    pub fn on_file_deleted(&mut self, path: &str) -> usize {
        let before = self.files.len();
        let selected = self.selected;
        self.files.retain(|f| f.path.as_deref() != Some(path));
        if let Some(id) = selected {
            if !self.files.iter().any(|f| f.id == id) {
                self.selected = None;
            }
        }
        before - self.files.len()
    }

    /// Expand an attachment in the composer; unknown ids clear the selection.
    pub fn select(&mut self, id: Option<Uuid>) {
        self.selected = id.filter(|id| self.files.iter().any(|f| f.id == *id));
    }

    pub fn selected(&self) -> Option<&AttachedFile> {
        let id = self.selected?;
        self.files.iter().find(|f| f.id == id)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path.as_deref() == Some(path))
    }

    pub fn files(&self) -> &[AttachedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Remove and return everything, e.g. when a message is sent
    pub fn take(&mut self) -> Vec<AttachedFile> {
        self.selected = None;
        std::mem::take(&mut self.files)
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.selected = None;
    }
}
