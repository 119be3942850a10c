// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AibarError, ApiError, Result};

/// Construct a standardized provider error.
pub(crate) fn server_error(provider: &str, status: u16, message: impl Into<String>) -> AibarError {
    AibarError::Api(ApiError::Provider {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

/// Error body shared by both vendors: `{"error": {"message": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Classify a non-2xx response, preferring the vendor's own message and
/// falling back to the status text.
pub(crate) fn parse_error(provider: &str, status: StatusCode, body: &str) -> AibarError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string())
        });
    server_error(provider, status.as_u16(), message)
}

/// Send a request, racing it against the cancellation token.
pub(crate) async fn send(
    provider: &str,
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ApiError::Cancelled.into()),
        result = request.send() => result.map_err(|e| ApiError::Network(e.to_string()))?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(parse_error(provider, status, &body));
    }
    Ok(response)
}

/// Payload of an SSE `data:` line; `None` for other lines and `[DONE]`.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    let data = line.trim().strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        None
    } else {
        Some(data)
    }
}

/// Read a server-sent event body, decoding each `data:` payload as `T`.
///
/// Undecodable payloads are logged and skipped. The body stream is dropped
/// on every return path, including cancellation.
pub(crate) async fn read_events<T, F>(
    provider: &str,
    response: Response,
    cancel: &CancellationToken,
    mut handle: F,
) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    let mut stream = Box::pin(response.bytes_stream());
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled.into()),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                buffer.extend_from_slice(&bytes);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    dispatch_line(provider, &String::from_utf8_lossy(&line), &mut handle);
                }
            }
            Some(Err(e)) => return Err(ApiError::StreamError(e.to_string()).into()),
            None => break,
        }
    }

    if !buffer.is_empty() {
        dispatch_line(provider, &String::from_utf8_lossy(&buffer), &mut handle);
    }
    Ok(())
}

fn dispatch_line<T, F>(provider: &str, line: &str, handle: &mut F)
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    let Some(data) = sse_data(line) else {
        return;
    };
    match serde_json::from_str::<T>(data) {
        Ok(event) => handle(event),
        Err(e) => tracing::warn!(provider, error = %e, "Skipping undecodable stream chunk"),
    }
}
