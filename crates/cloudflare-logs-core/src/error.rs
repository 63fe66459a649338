// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the poller.
//!
//! Only [`PollError::Api`] is recoverable: the controller downgrades it to
//! an empty batch for the current iteration. Everything else propagates and
//! terminates the run.

use serde::Deserialize;
use thiserror::Error;

/// One `{code, message}` entry from the Cloudflare error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorDetail {
    pub code: i64,
    pub message: String,
}

/// Structured non-2xx response from the Cloudflare API.
///
/// The error body is parsed as the standard `{success, errors}` envelope;
/// a body that is not valid JSON yields the empty defaults, so callers can
/// always branch on the status code and any error codes that were present.
#[derive(Debug, Error)]
#[error("Cloudflare API error (status {status_code}) calling {url}")]
pub struct ApiError {
    pub url: String,
    pub status_code: u16,
    pub success: bool,
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

impl ApiError {
    /// Builds an `ApiError` from a non-2xx response body.
    pub fn from_response(url: impl Into<String>, status_code: u16, body: &str) -> Self {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body).unwrap_or_default();
        ApiError {
            url: url.into(),
            status_code,
            success: envelope.success,
            errors: envelope.errors,
        }
    }
}

/// Errors that can occur while polling Cloudflare for log entries.
#[derive(Debug, Error)]
pub enum PollError {
    /// Transport-level issue (DNS, TLS, socket).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be read or decompressed.
    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),

    /// Non-2xx response carrying the provider's error envelope.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// No active zone matches the configured domain.
    #[error("no active zone found for domain {0}")]
    ZoneNotFound(String),

    /// A 2xx payload did not decode as the expected shape.
    #[error("malformed API response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// Checkpoint state could not be read.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] crate::checkpoint::CheckpointError),

    /// The downstream event receiver was dropped.
    #[error("event sink closed")]
    SinkClosed,

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
