// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Wagate workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Provider-assigned identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Caller role carried in auth token claims.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Bypasses all ownership checks.
    Admin,
    /// May only operate on sessions it owns.
    User,
}

/// A verified caller identity, extracted from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Optional outbound proxy for a session's protocol connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub enabled: bool,
    /// Proxy kind, e.g. "socks5" or "http".
    pub kind: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// A geographic location payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// A media attachment payload, referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub mime_type: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Content of an outbound send, one variant per send operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundContent {
    Text { body: String },
    Location(Location),
    Attachment(Attachment),
}

/// Events emitted by a protocol client over its pairing event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A pairing code was issued; the caller has `expires_in_secs` to scan it.
    PairingCode {
        code: String,
        expires_in_secs: u64,
    },
    /// Pairing succeeded; `phone` is the verified phone identifier.
    Authenticated { phone: String },
    /// The pairing window expired without authentication.
    PairingTimeout,
    /// The underlying connection closed.
    Disconnected,
}

/// Kinds of durable jobs the queue executes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Send one message as soon as a worker is free.
    Single,
    /// Send one message at a scheduled time.
    Scheduled,
    /// Fan one request out into many paced per-recipient sends.
    Bulk,
}

/// Job lifecycle status.
///
/// `pending → running → {completed | failed | cancelled}`; the only
/// backwards transition is `failed → pending` via an explicit retry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses never transition again (except `failed` via retry).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A persisted session record.
///
/// The connection flags are owned by the session manager; `id`, `owner_id`,
/// and `created_at` are immutable after creation. Invariant: `logged_in`
/// implies `connected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Requested phone identifier (hint supplied at create).
    pub phone: Option<String>,
    /// Verified phone identifier, set once pairing succeeds.
    pub actual_phone: Option<String>,
    pub webhook_url: Option<String>,
    pub auto_reply: Option<String>,
    pub proxy: Option<ProxyConfig>,
    pub connected: bool,
    pub logged_in: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A persisted job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub kind: JobKind,
    pub session_id: String,
    /// Kind-specific payload, serialized JSON.
    pub payload: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    /// RFC 3339; `None` means run as soon as a worker is free.
    pub scheduled_for: Option<String>,
    /// Earliest time a retried job becomes eligible again (backoff gate).
    pub next_attempt_at: Option<String>,
    /// Bulk progress: total recipients.
    pub total: u32,
    /// Bulk progress: recipients sent successfully.
    pub succeeded: u32,
    /// Bulk progress: recipients that failed.
    pub failed: u32,
    /// Worker liveness lease; a `running` job past this time is reclaimable.
    pub locked_until: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRecord {
    /// Recipients not yet attempted (bulk jobs).
    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.succeeded + self.failed)
    }
}
