// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Wagate gateway.

use thiserror::Error;

/// The primary error type used across all Wagate services and trait boundaries.
///
/// The gateway maps each variant to a stable HTTP status and machine-readable
/// code. `Internal` messages are logged but never returned to callers.
#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed or missing request fields, rejected before any state change.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown session or job id.
    #[error("not found")]
    NotFound,

    /// Ownership check failed for the caller.
    #[error("forbidden")]
    Forbidden,

    /// Operation requires an authenticated session that isn't.
    #[error("session not ready")]
    NotReady,

    /// Login attempts from this address are blocked.
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Duplicate resource conditions (e.g. session id collision on create).
    #[error("conflict")]
    Conflict,

    /// Operation not valid in the resource's current state
    /// (e.g. cancelling a completed job).
    #[error("invalid state")]
    InvalidState,

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Protocol client errors (connection failure, send failure, pairing).
    #[error("client error: {message}")]
    Client {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors. Never surfaced verbatim to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Convenience constructor for client errors without an underlying source.
    pub fn client(message: impl Into<String>) -> Self {
        GateError::Client {
            message: message.into(),
            source: None,
        }
    }

    /// True if a `connect` attempt failing with this error leaves the session
    /// safe to retry (transient protocol failure, not a poisoned state).
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Client { .. } | GateError::Storage { .. })
    }
}
