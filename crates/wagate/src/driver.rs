// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback protocol driver for builds without a real messaging client.
//!
//! The gateway manages sessions and jobs against whatever `ClientFactory`
//! it is wired with. Until a protocol driver crate is linked in, every
//! connect attempt fails with a client error so the HTTP surface, storage,
//! and job machinery stay exercisable end to end.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wagate_core::GateError;
use wagate_core::traits::{ClientFactory, ProtocolClient};
use wagate_core::types::{Attachment, ClientEvent, Location, MessageId, ProxyConfig};

const NO_DRIVER: &str = "no messaging protocol driver is compiled into this build";

/// Factory producing clients that refuse to connect.
pub struct UnconfiguredClientFactory;

impl ClientFactory for UnconfiguredClientFactory {
    fn create(&self, session_id: &str, _proxy: Option<&ProxyConfig>) -> Arc<dyn ProtocolClient> {
        Arc::new(UnconfiguredClient {
            session_id: session_id.to_string(),
        })
    }
}

struct UnconfiguredClient {
    session_id: String,
}

#[async_trait]
impl ProtocolClient for UnconfiguredClient {
    async fn connect(&self) -> Result<(), GateError> {
        tracing::warn!(session_id = %self.session_id, "connect requested without a protocol driver");
        Err(GateError::client(NO_DRIVER))
    }

    async fn disconnect(&self) {}

    async fn logout(&self) -> Result<(), GateError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn is_logged_in(&self) -> bool {
        false
    }

    async fn events(&self) -> Result<mpsc::Receiver<ClientEvent>, GateError> {
        Err(GateError::client(NO_DRIVER))
    }

    async fn send_text(&self, _to: &str, _body: &str) -> Result<MessageId, GateError> {
        Err(GateError::NotReady)
    }

    async fn send_location(
        &self,
        _to: &str,
        _location: &Location,
    ) -> Result<MessageId, GateError> {
        Err(GateError::NotReady)
    }

    async fn send_attachment(
        &self,
        _to: &str,
        _attachment: &Attachment,
    ) -> Result<MessageId, GateError> {
        Err(GateError::NotReady)
    }
}
