// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for aibar
//!
//! Provides abstraction over the supported model providers.

pub mod message;
pub mod mock_provider;
pub mod models;
pub mod provider;
pub mod providers;
pub mod registry;

pub use message::*;
pub use models::{all_models, ModelFamily, ModelInfo};
pub use provider::*;
pub use registry::{ProviderFactory, ProviderRegistry, TransportFactory};
