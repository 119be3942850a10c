// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for aibar
//!
//! Handles the settings file, the live AI settings pushed by the host, and
//! change notification for the provider registry.

pub mod settings;
pub mod watch;

pub use settings::*;
pub use watch::{ConfigSource, Subscription};
