// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation handling
//!
//! The prompt catalog turns a command into provider messages and the engine
//! keeps each adapter's windowed history.

pub mod engine;
pub mod prompts;

pub use engine::{trim_history, window_history, ProviderAdapter};
pub use prompts::{AiCommand, CommandParams, CommandPrompt, FileContext, PromptCatalog};
