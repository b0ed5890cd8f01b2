// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol client trait for the external messaging capability.
//!
//! The real client (connect, pair, send) is an opaque external dependency;
//! this trait is the seam Wagate drives it through. Tests substitute
//! `wagate-test-utils::MockProtocolClient`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GateError;
use crate::types::{Attachment, ClientEvent, Location, MessageId, ProxyConfig};

/// One tenant session's connection to the messaging protocol.
///
/// Implementations must be safe to share behind an `Arc`; the session
/// manager calls into a client from the event pump task and from request
/// handlers concurrently.
#[async_trait]
pub trait ProtocolClient: Send + Sync + 'static {
    /// Opens the protocol connection. Transient failures are retryable.
    async fn connect(&self) -> Result<(), GateError>;

    /// Closes the connection, keeping stored credentials for silent reconnect.
    async fn disconnect(&self);

    /// Closes the connection and invalidates stored credentials, so the next
    /// `connect` requires re-pairing.
    async fn logout(&self) -> Result<(), GateError>;

    fn is_connected(&self) -> bool;

    fn is_logged_in(&self) -> bool;

    /// Subscribes to connection/pairing events. The stream ends when the
    /// client disconnects or the pairing window closes.
    async fn events(&self) -> Result<mpsc::Receiver<ClientEvent>, GateError>;

    /// Sends a text message. Only valid while logged in.
    async fn send_text(&self, to: &str, body: &str) -> Result<MessageId, GateError>;

    /// Sends a location message. Only valid while logged in.
    async fn send_location(&self, to: &str, location: &Location)
    -> Result<MessageId, GateError>;

    /// Sends a media attachment. Only valid while logged in.
    async fn send_attachment(
        &self,
        to: &str,
        attachment: &Attachment,
    ) -> Result<MessageId, GateError>;
}

/// Builds a protocol client for a newly created session.
///
/// Injected into the session manager so production wiring and tests choose
/// the implementation.
pub trait ClientFactory: Send + Sync + 'static {
    fn create(
        &self,
        session_id: &str,
        proxy: Option<&ProxyConfig>,
    ) -> std::sync::Arc<dyn ProtocolClient>;
}
