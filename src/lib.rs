// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! aibar - backend of an editor-embedded AI chat panel.
//!
//! This crate exposes the runtime used by:
//! - the `aibar` CLI (`src/main.rs`)
//! - the JSON-lines bridge the editor host talks to
//!
//! Architecture highlights:
//! - `llm`: provider transports (OpenAI, Claude), model catalog, adapter registry
//! - `chat`: prompt catalog and the per-model conversation engine
//! - `session`: sessions, recency grouping, persistence and delete undo/redo
//! - `attachments`: files and snippets attached to the next message
//! - `protocol`, `bridge`: wire messages and their dispatch to the core
//! - `config`: settings file, live AI settings and change subscriptions

pub mod attachments;
pub mod bridge;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod protocol;
pub mod session;

pub use error::{AibarError, Result};
