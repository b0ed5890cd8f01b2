// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock protocol client for deterministic testing.
//!
//! `MockProtocolClient` implements `ProtocolClient` with scripted pairing
//! events, controllable per-send outcomes, and captured outbound messages
//! for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};

use wagate_core::GateError;
use wagate_core::traits::{ClientFactory, ProtocolClient};
use wagate_core::types::{
    Attachment, ClientEvent, Location, MessageId, OutboundContent, ProxyConfig,
};

/// A message captured by the mock's send methods.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub to: String,
    pub content: OutboundContent,
}

/// A mock protocol client for testing.
///
/// Provides three controls:
/// - **events**: `emit()` pushes pairing events into the stream returned by
///   `events()`; events emitted before subscription are buffered
/// - **send outcomes**: `push_send_error()` queues a failure for an upcoming
///   send; sends succeed by default
/// - **sent**: messages passed to the send methods are captured and
///   retrievable via `sent_messages()`
pub struct MockProtocolClient {
    connected: AtomicBool,
    logged_in: AtomicBool,
    fail_next_connect: AtomicBool,
    connect_gate: Mutex<Option<Arc<Notify>>>,
    pending_events: Mutex<VecDeque<ClientEvent>>,
    event_tx: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    send_errors: Mutex<VecDeque<String>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl MockProtocolClient {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            logged_in: AtomicBool::new(false),
            fail_next_connect: AtomicBool::new(false),
            connect_gate: Mutex::new(None),
            pending_events: Mutex::new(VecDeque::new()),
            event_tx: Mutex::new(None),
            send_errors: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Emit a pairing event to the subscriber, or buffer it until one exists.
    ///
    /// `Authenticated` also flips the mock's auth flags, mirroring what a
    /// real client does when pairing completes.
    pub async fn emit(&self, event: ClientEvent) {
        if let ClientEvent::Authenticated { .. } = event {
            self.connected.store(true, Ordering::SeqCst);
            self.logged_in.store(true, Ordering::SeqCst);
        }
        if let ClientEvent::Disconnected = event {
            self.connected.store(false, Ordering::SeqCst);
            self.logged_in.store(false, Ordering::SeqCst);
        }
        let tx = self.event_tx.lock().await;
        match tx.as_ref() {
            Some(tx) => {
                let _ = tx.send(event).await;
            }
            None => {
                drop(tx);
                self.pending_events.lock().await.push_back(event);
            }
        }
    }

    /// Make the next `connect()` call fail with a client error.
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Make the next `connect()` call block until the returned handle is
    /// notified, so tests can interleave other operations mid-connect.
    pub async fn gate_next_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock().await = Some(gate.clone());
        gate
    }

    /// Force the auth flags, bypassing the pairing flow.
    pub fn set_authenticated(&self, connected: bool, logged_in: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    /// Queue an error for the next send; sends consume queued errors in order
    /// and succeed once the queue is empty.
    pub async fn push_send_error(&self, message: &str) {
        self.send_errors.lock().await.push_back(message.to_string());
    }

    /// All messages captured by the send methods, in send order.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    async fn record_send(&self, to: &str, content: OutboundContent) -> Result<MessageId, GateError> {
        if !self.is_logged_in() {
            return Err(GateError::NotReady);
        }
        if let Some(message) = self.send_errors.lock().await.pop_front() {
            return Err(GateError::client(message));
        }
        self.sent.lock().await.push(SentMessage {
            to: to.to_string(),
            content,
        });
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }
}

impl Default for MockProtocolClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolClient for MockProtocolClient {
    async fn connect(&self) -> Result<(), GateError> {
        let gate = self.connect_gate.lock().await.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(GateError::client("mock connect failure"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.logged_in.store(false, Ordering::SeqCst);
    }

    async fn logout(&self) -> Result<(), GateError> {
        self.connected.store(false, Ordering::SeqCst);
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn events(&self) -> Result<mpsc::Receiver<ClientEvent>, GateError> {
        let (tx, rx) = mpsc::channel(16);
        let mut pending = self.pending_events.lock().await;
        while let Some(event) = pending.pop_front() {
            let _ = tx.send(event).await;
        }
        *self.event_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<MessageId, GateError> {
        self.record_send(
            to,
            OutboundContent::Text {
                body: body.to_string(),
            },
        )
        .await
    }

    async fn send_location(
        &self,
        to: &str,
        location: &Location,
    ) -> Result<MessageId, GateError> {
        self.record_send(to, OutboundContent::Location(location.clone()))
            .await
    }

    async fn send_attachment(
        &self,
        to: &str,
        attachment: &Attachment,
    ) -> Result<MessageId, GateError> {
        self.record_send(to, OutboundContent::Attachment(attachment.clone()))
            .await
    }
}

/// A factory that hands out `MockProtocolClient`s and remembers them by
/// session id, so tests can drive the client the manager is using.
pub struct MockClientFactory {
    clients: std::sync::Mutex<std::collections::HashMap<String, Arc<MockProtocolClient>>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self {
            clients: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// The client created for `session_id`, if `create` was called for it.
    pub fn client_for(&self, session_id: &str) -> Option<Arc<MockProtocolClient>> {
        self.clients
            .lock()
            .expect("mock factory lock poisoned")
            .get(session_id)
            .cloned()
    }
}

impl Default for MockClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory for MockClientFactory {
    fn create(
        &self,
        session_id: &str,
        _proxy: Option<&ProxyConfig>,
    ) -> Arc<dyn ProtocolClient> {
        let client = Arc::new(MockProtocolClient::new());
        self.clients
            .lock()
            .expect("mock factory lock poisoned")
            .insert(session_id.to_string(), client.clone());
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_buffered_before_subscription() {
        let client = MockProtocolClient::new();
        client
            .emit(ClientEvent::PairingCode {
                code: "ABCD-1234".to_string(),
                expires_in_secs: 60,
            })
            .await;

        let mut rx = client.events().await.unwrap();
        match rx.recv().await.unwrap() {
            ClientEvent::PairingCode { code, .. } => assert_eq!(code, "ABCD-1234"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn authenticated_event_flips_flags() {
        let client = MockProtocolClient::new();
        assert!(!client.is_logged_in());
        client
            .emit(ClientEvent::Authenticated {
                phone: "15551234567".to_string(),
            })
            .await;
        assert!(client.is_connected());
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn sends_require_login_and_consume_errors() {
        let client = MockProtocolClient::new();
        assert!(matches!(
            client.send_text("15550001111", "hi").await,
            Err(GateError::NotReady)
        ));

        client.set_authenticated(true, true);
        client.push_send_error("boom").await;
        assert!(client.send_text("15550001111", "first").await.is_err());
        assert!(client.send_text("15550001111", "second").await.is_ok());

        let sent = client.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "15550001111");
    }

    #[tokio::test]
    async fn factory_remembers_clients_by_session() {
        let factory = MockClientFactory::new();
        let created = factory.create("1234567890", None);
        let looked_up = factory.client_for("1234567890").unwrap();
        looked_up.set_authenticated(true, true);
        assert!(created.is_logged_in());
        assert!(factory.client_for("0000000000").is_none());
    }
}
