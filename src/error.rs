// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for aibar
//!
//! Configuration errors are raised before any network call, transport errors
//! come from the provider adapters, and everything ends up rendered as an
//! assistant error message by the session store.

use thiserror::Error;

/// Main error type for aibar operations
#[derive(Error, Debug)]
pub enum AibarError {
    /// API-related errors
    #[error("{0}")]
    Api(#[from] ApiError),

    /// The provider needs an API key that is not configured
    #[error("{provider} API key is required")]
    MissingCredential { provider: String },

    /// Model identifier outside every known family
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Command missing from the provider's prompt catalog
    #[error("Command {command} not supported by {provider}")]
    UnknownCommand { command: String, provider: String },

    /// A chat turn is already in flight
    #[error("A message is already being processed")]
    Busy,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Provider answered with a non-2xx status
    #[error("{provider} API error: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,
}

impl AibarError {
    /// Errors raised before any network traffic; these are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AibarError::MissingCredential { .. }
                | AibarError::UnsupportedModel(_)
                | AibarError::Config(_)
        )
    }

    /// HTTP status carried by a provider error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AibarError::Api(ApiError::Provider { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for aibar operations
pub type Result<T> = std::result::Result<T, AibarError>;
