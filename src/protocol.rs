// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Wire messages between the core, the host editor and the chat panel
//!
//! Every message is a JSON object with a `type` discriminant and an optional
//! `data` payload, e.g. `{"type":"FILE_DELETED","data":{"path":"src/a.rs"}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachments::{AttachedFile, EditorSelection};
use crate::chat::prompts::AiCommand;
use crate::config::AiSettings;
use crate::error::Result;
use crate::session::grouping::{relative_time, RecencyBand, SessionGroup};
use crate::session::model::Session;

/// Entry kind in the workspace file tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTreeKind {
    File,
    Directory,
}

/// One workspace entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeItem {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileTreeKind,
}

impl FileTreeItem {
    /// File entry named after the last path component
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = file_name(&path).to_string();
        Self {
            id: path.clone(),
            name,
            path,
            kind: FileTreeKind::File,
        }
    }
}

/// Last component of a `/` or `\` separated path
pub fn file_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\')
        .find(|part| !part.is_empty())
        .unwrap_or(path)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeData {
    #[serde(default)]
    pub tree: Vec<FileTreeItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathData {
    pub path: String,
}

impl PathData {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Answer to `READ_FILE`. On failure `content` carries the error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInfoData {
    pub data: EditorSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationData {
    pub configuration: AiSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_configuration: Option<AiSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogData {
    pub message: String,
}

/// Messages pushed by the host editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostEvent {
    FileTree(FileTreeData),
    FileContent(FileContentData),
    WorkspacePath(PathData),
    EditorSelectionInfo(SelectionInfoData),
    FileCreated(PathData),
    FileDeleted(PathData),
    ConfigurationUpdate(ConfigurationData),
    ClearHistory(Option<ClearHistoryData>),
    NewChat,
    ToggleHistory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageData {
    pub text: String,
    /// Falls back to the selected model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<AiCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRef {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameData {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: Uuid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectAttachmentData {
    #[serde(default)]
    pub id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelData {
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchData {
    #[serde(default)]
    pub query: String,
}

/// User actions coming from the chat panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PanelCommand {
    SendMessage(SendMessageData),
    Cancel,
    SelectSession(SessionRef),
    RenameSession(RenameData),
    DeleteSession(SessionRef),
    UndoDelete,
    RedoDelete,
    AttachFile(PathData),
    RemoveAttachment(AttachmentRef),
    SelectAttachment(Option<SelectAttachmentData>),
    Paste(TextData),
    SelectModel(ModelData),
    SearchHistory(Option<SearchData>),
    GetFileTree(Option<FileTreeRequest>),
    OpenFile(PathData),
    GetState,
    Log(LogData),
    Error(LogData),
}

/// Anything the bridge can receive
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Host(HostEvent),
    Panel(PanelCommand),
}

impl Inbound {
    /// Parse one JSON message
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Session row in the history view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub message_count: usize,
    pub last_updated_at: DateTime<Utc>,
    /// e.g. "5m ago"
    pub updated: String,
}

impl SessionSummary {
    pub fn new(session: &Session, now: DateTime<Utc>) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            message_count: session.messages.len(),
            last_updated_at: session.last_updated_at,
            updated: relative_time(session.last_updated_at, now),
        }
    }
}

/// One recency band of the history view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryGroup {
    pub band: RecencyBand,
    pub label: &'static str,
    pub sessions: Vec<SessionSummary>,
}

impl HistoryGroup {
    pub fn from_groups(groups: &[SessionGroup<'_>], now: DateTime<Utc>) -> Vec<Self> {
        groups
            .iter()
            .map(|group| Self {
                band: group.band,
                label: group.label,
                sessions: group
                    .sessions
                    .iter()
                    .map(|s| SessionSummary::new(s, now))
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryData {
    pub query: String,
    pub groups: Vec<HistoryGroup>,
}

/// Everything the panel renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub current_session: Option<Session>,
    pub selected_model: String,
    pub is_typing: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub attachments: Vec<AttachedFile>,
    pub selected_attachment: Option<Uuid>,
    pub history_visible: bool,
    pub history: Vec<HistoryGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunkData {
    pub session_id: Option<Uuid>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryVisibilityData {
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileErrorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    pub message: String,
    pub error: bool,
}

/// Messages the core sends out: requests for the host and panel updates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    GetFileTree(FileTreeRequest),
    ReadFile(PathData),
    OpenFile(PathData),
    GetWorkspacePath,
    GetEditorSelectionInfo,
    GetConfiguration,
    FileTree(FileTreeData),
    State(Box<PanelState>),
    StreamChunk(StreamChunkData),
    History(HistoryData),
    HistoryVisibility(HistoryVisibilityData),
    /// Pasted text that should go into the composer as typed
    InsertText(TextData),
    FileError(FileErrorData),
    Notification(NotificationData),
}

impl OutboundMessage {
    pub fn notification(message: impl Into<String>, error: bool) -> Self {
        OutboundMessage::Notification(NotificationData {
            message: message.into(),
            error,
        })
    }

    /// The `type` discriminant as sent on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::GetFileTree(_) => "GET_FILE_TREE",
            OutboundMessage::ReadFile(_) => "READ_FILE",
            OutboundMessage::OpenFile(_) => "OPEN_FILE",
            OutboundMessage::GetWorkspacePath => "GET_WORKSPACE_PATH",
            OutboundMessage::GetEditorSelectionInfo => "GET_EDITOR_SELECTION_INFO",
            OutboundMessage::GetConfiguration => "GET_CONFIGURATION",
            OutboundMessage::FileTree(_) => "FILE_TREE",
            OutboundMessage::State(_) => "STATE",
            OutboundMessage::StreamChunk(_) => "STREAM_CHUNK",
            OutboundMessage::History(_) => "HISTORY",
            OutboundMessage::HistoryVisibility(_) => "HISTORY_VISIBILITY",
            OutboundMessage::InsertText(_) => "INSERT_TEXT",
            OutboundMessage::FileError(_) => "FILE_ERROR",
            OutboundMessage::Notification(_) => "NOTIFICATION",
        }
    }
}
