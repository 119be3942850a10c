// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message bridge between the host editor, the chat panel and the core
//!
//! Host events and panel commands arrive as [`Inbound`] messages; everything
//! the core wants to say goes to a [`MessageSink`]. In JSONL mode the sink is
//! stdout and each message is one line, so a host process can spawn `aibar
//! bridge` and talk to it over pipes.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::attachments::{snippet_from_paste, AttachedFile, EditorSelection};
use crate::chat::prompts::AiCommand;
use crate::error::{AibarError, Result};
use crate::protocol::{
    file_name, FileContentData, FileErrorData, HistoryData, HistoryGroup, HistoryVisibilityData,
    HostEvent, Inbound, OutboundMessage, PanelCommand, PanelState, PathData, SendMessageData,
    StreamChunkData, TextData,
};
use crate::session::chat::{ChatController, TurnOutcome};
use crate::session::store::{ChatRequest, SessionStore};

/// Where outbound messages go
pub trait MessageSink: Send + Sync {
    fn post(&self, message: &OutboundMessage) -> Result<()>;
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> MessageSink for JsonLinesSink<W> {
    fn post(&self, message: &OutboundMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything posted so far
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.lock().clone()
    }

    /// Drain the posted messages
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutboundMessage>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MessageSink for MemorySink {
    fn post(&self, message: &OutboundMessage) -> Result<()> {
        self.lock().push(message.clone());
        Ok(())
    }
}

/// Snapshot of the store for the panel
pub fn panel_state(store: &SessionStore, history_visible: bool) -> PanelState {
    let now = chrono::Utc::now();
    let attachments = store.attachments();
    PanelState {
        current_session: store.current_session().cloned(),
        selected_model: store.selected_model().to_string(),
        is_typing: store.is_typing(),
        can_undo: store.can_undo(),
        can_redo: store.can_redo(),
        attachments: attachments.files().to_vec(),
        selected_attachment: attachments.selected().map(|f| f.id),
        history_visible,
        history: HistoryGroup::from_groups(&store.grouped_sessions_at("", now), now),
    }
}

struct InFlight {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct BridgeState {
    history_visible: bool,
    /// Paths with an outstanding READ_FILE, oldest first
    pending_reads: VecDeque<String>,
    selection: Option<EditorSelection>,
    workspace_path: Option<String>,
    in_flight: Option<InFlight>,
}

fn lock_state(state: &Mutex<BridgeState>) -> MutexGuard<'_, BridgeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn post_or_warn(sink: &dyn MessageSink, message: &OutboundMessage) {
    if let Err(e) = sink.post(message) {
        tracing::warn!(kind = message.kind(), error = %e, "Failed to post message");
    }
}

/// Dispatches inbound messages to the core
pub struct PanelBridge {
    chat: ChatController,
    sink: Arc<dyn MessageSink>,
    state: Arc<Mutex<BridgeState>>,
}

impl PanelBridge {
    pub fn new(chat: ChatController, sink: Arc<dyn MessageSink>) -> Self {
        let state = Arc::new(Mutex::new(BridgeState::default()));

        // Turns run in the background; push the store to the panel whenever
        // one records something.
        let hook_sink = Arc::clone(&sink);
        let hook_state = Arc::clone(&state);
        let chat = chat.with_change_hook(Arc::new(move |store: &SessionStore| {
            let visible = lock_state(&hook_state).history_visible;
            let message = OutboundMessage::State(Box::new(panel_state(store, visible)));
            post_or_warn(hook_sink.as_ref(), &message);
        }));

        Self { chat, sink, state }
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        lock_state(&self.state)
    }

    fn post(&self, message: OutboundMessage) -> Result<()> {
        self.sink.post(&message)
    }

    fn post_state(&self) -> Result<()> {
        let visible = self.state().history_visible;
        let state = panel_state(&self.chat.store(), visible);
        self.post(OutboundMessage::State(Box::new(state)))
    }

    pub fn history_visible(&self) -> bool {
        self.state().history_visible
    }

    pub fn workspace_path(&self) -> Option<String> {
        self.state().workspace_path.clone()
    }

    pub fn editor_selection(&self) -> Option<EditorSelection> {
        self.state().selection.clone()
    }

    /// Ask the host for what the panel needs on startup
    pub fn start(&self) -> Result<()> {
        self.post(OutboundMessage::GetConfiguration)?;
        self.post(OutboundMessage::GetWorkspacePath)?;
        self.post_state()
    }

    /// Parse and handle one JSON message
    pub async fn handle_line(&self, line: &str) -> Result<()> {
        let inbound = Inbound::parse(line)?;
        self.handle(inbound).await
    }

    pub async fn handle(&self, inbound: Inbound) -> Result<()> {
        match inbound {
            Inbound::Host(event) => self.handle_host(event).await,
            Inbound::Panel(command) => self.handle_panel(command),
        }
    }

    async fn handle_host(&self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::FileTree(data) => self.post(OutboundMessage::FileTree(data)),
            HostEvent::FileContent(data) => self.on_file_content(data),
            HostEvent::WorkspacePath(data) => {
                self.state().workspace_path = Some(data.path);
                Ok(())
            }
            HostEvent::EditorSelectionInfo(info) => {
                self.state().selection = Some(info.data);
                Ok(())
            }
            HostEvent::FileCreated(data) => {
                tracing::debug!(path = %data.path, "File created");
                self.post(OutboundMessage::GetFileTree(Default::default()))
            }
            HostEvent::FileDeleted(data) => {
                self.state().pending_reads.retain(|p| *p != data.path);
                let removed = self.chat.store().attachments_mut().on_file_deleted(&data.path);
                tracing::debug!(path = %data.path, removed, "File deleted");
                self.post(OutboundMessage::GetFileTree(Default::default()))?;
                if removed > 0 {
                    self.post_state()?;
                }
                Ok(())
            }
            HostEvent::ConfigurationUpdate(data) => {
                let changed = self
                    .chat
                    .registry()
                    .config_source()
                    .update(data.configuration);
                tracing::debug!(changed, "Configuration update");
                Ok(())
            }
            HostEvent::ClearHistory(data) => {
                self.cancel_in_flight();
                self.chat.store().clear_all()?;
                self.chat.registry().clear_histories().await;
                if let Some(configuration) = data.and_then(|d| d.current_configuration) {
                    self.chat.registry().config_source().update(configuration);
                }
                self.post_state()
            }
            HostEvent::NewChat => {
                self.chat.store().create_new_chat()?;
                self.post_state()
            }
            HostEvent::ToggleHistory => {
                let visible = {
                    let mut state = self.state();
                    state.history_visible = !state.history_visible;
                    state.history_visible
                };
                self.post(OutboundMessage::HistoryVisibility(HistoryVisibilityData {
                    visible,
                }))
            }
        }
    }

    fn on_file_content(&self, data: FileContentData) -> Result<()> {
        let path = {
            let mut state = self.state();
            match data.path {
                Some(path) => {
                    if let Some(pos) = state.pending_reads.iter().position(|p| *p == path) {
                        state.pending_reads.remove(pos);
                    }
                    Some(path)
                }
                None => state.pending_reads.pop_front(),
            }
        };

        if data.error {
            return self.post(OutboundMessage::FileError(FileErrorData {
                path,
                message: data.content,
            }));
        }
        let Some(path) = path else {
            tracing::warn!("File content arrived with no pending read");
            return Ok(());
        };

        {
            let mut store = self.chat.store();
            let attachments = store.attachments_mut();
            if !attachments.contains_path(&path) {
                attachments.attach(AttachedFile::file(file_name(&path), path.clone(), data.content));
            }
        }
        self.post_state()
    }

    fn handle_panel(&self, command: PanelCommand) -> Result<()> {
        match command {
            PanelCommand::SendMessage(data) => self.send(data),
            PanelCommand::Cancel => {
                self.cancel_in_flight();
                Ok(())
            }
            PanelCommand::SelectSession(r) => {
                self.chat.store().select_session(r.id)?;
                self.post_state()
            }
            PanelCommand::RenameSession(data) => {
                self.chat.store().rename_session(data.id, &data.title)?;
                self.post_state()
            }
            PanelCommand::DeleteSession(r) => {
                self.chat.store().delete_session(r.id)?;
                self.post_state()
            }
            PanelCommand::UndoDelete => {
                self.chat.store().undo_delete()?;
                self.post_state()
            }
            PanelCommand::RedoDelete => {
                self.chat.store().redo_delete()?;
                self.post_state()
            }
            PanelCommand::AttachFile(data) => {
                if self.chat.store().attachments().contains_path(&data.path) {
                    tracing::debug!(path = %data.path, "File already attached");
                    return Ok(());
                }
                self.state().pending_reads.push_back(data.path.clone());
                self.post(OutboundMessage::ReadFile(data))
            }
            PanelCommand::RemoveAttachment(r) => {
                self.chat.store().attachments_mut().remove(r.id);
                self.post_state()
            }
            PanelCommand::SelectAttachment(data) => {
                self.chat
                    .store()
                    .attachments_mut()
                    .select(data.and_then(|d| d.id));
                self.post_state()
            }
            PanelCommand::Paste(data) => {
                let selection = self.state().selection.clone();
                match snippet_from_paste(&data.text, selection.as_ref()) {
                    Some(snippet) => {
                        self.chat.store().attachments_mut().attach(snippet);
                        self.post_state()
                    }
                    None => self.post(OutboundMessage::InsertText(TextData { text: data.text })),
                }
            }
            PanelCommand::SelectModel(data) => {
                let result = self.chat.store().set_selected_model(&data.model);
                match result {
                    Err(e @ AibarError::UnsupportedModel(_)) => {
                        self.post(OutboundMessage::notification(e.to_string(), true))?
                    }
                    other => other?,
                }
                self.post_state()
            }
            PanelCommand::SearchHistory(data) => {
                let query = data.map(|d| d.query).unwrap_or_default();
                let now = chrono::Utc::now();
                let groups = {
                    let store = self.chat.store();
                    HistoryGroup::from_groups(&store.grouped_sessions_at(&query, now), now)
                };
                self.post(OutboundMessage::History(HistoryData { query, groups }))
            }
            PanelCommand::GetFileTree(request) => {
                self.post(OutboundMessage::GetFileTree(request.unwrap_or_default()))
            }
            PanelCommand::OpenFile(data) => self.post(OutboundMessage::OpenFile(PathData {
                path: data.path,
            })),
            PanelCommand::GetState => self.post_state(),
            PanelCommand::Log(data) => {
                tracing::info!(target: "aibar.panel", "{}", data.message);
                Ok(())
            }
            PanelCommand::Error(data) => {
                tracing::error!(target: "aibar.panel", "{}", data.message);
                Ok(())
            }
        }
    }

    fn send(&self, data: SendMessageData) -> Result<()> {
        let busy = self
            .state()
            .in_flight
            .as_ref()
            .is_some_and(|f| !f.handle.is_finished());
        if busy {
            tracing::warn!("Rejected send while a reply is outstanding");
            return self.post(OutboundMessage::notification(AibarError::Busy.to_string(), true));
        }

        let (model, session_id) = {
            let store = self.chat.store();
            let model = data
                .model
                .unwrap_or_else(|| store.selected_model().to_string());
            (model, store.current_session_id())
        };
        let mut request = ChatRequest::new(data.text, model)
            .with_command(data.command.unwrap_or(AiCommand::Chat));
        request.code = data.code;

        let cancel = CancellationToken::new();
        let chat = self.chat.clone();
        let sink = Arc::clone(&self.sink);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let chunk_sink = Arc::clone(&sink);
            let on_chunk = move |text: &str| {
                let chunk = OutboundMessage::StreamChunk(StreamChunkData {
                    session_id,
                    text: text.to_string(),
                });
                post_or_warn(chunk_sink.as_ref(), &chunk);
            };

            match chat.chat_with_ai(request, Some(&on_chunk), &token).await {
                Ok(TurnOutcome::Failed(message)) => {
                    tracing::debug!(error = %message.text, "Turn recorded an error");
                }
                Ok(outcome) => tracing::debug!(?outcome, "Turn finished"),
                Err(e) => {
                    tracing::warn!(error = %e, "Chat turn failed");
                    post_or_warn(sink.as_ref(), &OutboundMessage::notification(e.to_string(), true));
                }
            }
        });

        self.state().in_flight = Some(InFlight { cancel, handle });
        Ok(())
    }

    fn cancel_in_flight(&self) {
        if let Some(in_flight) = &self.state().in_flight {
            in_flight.cancel.cancel();
        }
    }

    /// Wait for the outstanding turn, if any
    pub async fn wait_idle(&self) {
        let handle = self.state().in_flight.take().map(|f| f.handle);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Chat turn task failed");
            }
        }
    }
}

/// Serve the bridge over a line-delimited JSON stream until it closes.
///
/// Malformed or failing messages are reported as notifications and do not
/// stop the loop.
pub async fn run_jsonl<R>(bridge: &PanelBridge, reader: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    bridge.start()?;
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = bridge.handle_line(line).await {
            tracing::warn!(error = %e, "Failed to handle message");
            bridge.post(OutboundMessage::notification(e.to_string(), true))?;
        }
    }
    bridge.wait_idle().await;
    Ok(())
}
