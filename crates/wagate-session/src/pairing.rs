// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairing event streamer: one live subscriber per session.
//!
//! The session event pump publishes pairing progress here; the gateway's
//! WebSocket handler subscribes. A new subscription replaces the previous
//! one (its channel closes), and terminal events (`success`, `error`) close
//! the channel without auto-restart.

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

/// Messages delivered over a session's pairing channel.
///
/// Serialized as a `{type, data}` envelope for the WebSocket wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PairingMessage {
    /// A pairing code to present to the user; not terminal, may repeat.
    Qr { code: String, expires_in_secs: u64 },
    /// Pairing completed; `phone` is the verified identifier. Terminal.
    Success { phone: String },
    /// Pairing failed. Terminal.
    Error { message: String },
    /// Heartbeat reply; passes through without touching pairing state.
    Pong,
}

impl PairingMessage {
    fn is_terminal(&self) -> bool {
        matches!(self, PairingMessage::Success { .. } | PairingMessage::Error { .. })
    }
}

/// Fan-in point between a session's event pump and its single subscriber.
pub struct PairingStreamer {
    subscriber: Mutex<Option<mpsc::Sender<PairingMessage>>>,
}

impl PairingStreamer {
    pub fn new() -> Self {
        Self {
            subscriber: Mutex::new(None),
        }
    }

    /// Subscribe to pairing messages, replacing any previous subscriber.
    ///
    /// The replaced subscriber's channel closes, which the gateway observes
    /// as end-of-stream.
    pub async fn subscribe(&self) -> mpsc::Receiver<PairingMessage> {
        let (tx, rx) = mpsc::channel(16);
        *self.subscriber.lock().await = Some(tx);
        rx
    }

    /// Publish a message to the current subscriber, if any.
    ///
    /// Terminal messages drop the subscriber afterwards, closing the channel.
    pub async fn publish(&self, message: PairingMessage) {
        let terminal = message.is_terminal();
        let mut guard = self.subscriber.lock().await;
        if let Some(tx) = guard.as_ref() {
            if tx.send(message).await.is_err() {
                // Subscriber went away; clear the slot.
                *guard = None;
                return;
            }
        }
        if terminal {
            *guard = None;
        }
    }

    /// Drop the subscriber without a terminal message (disconnect/teardown).
    pub async fn close(&self) {
        *self.subscriber.lock().await = None;
    }
}

impl Default for PairingStreamer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_to_subscriber() {
        let streamer = PairingStreamer::new();
        let mut rx = streamer.subscribe().await;
        streamer
            .publish(PairingMessage::Qr {
                code: "ABCD".into(),
                expires_in_secs: 60,
            })
            .await;
        assert!(matches!(
            rx.recv().await,
            Some(PairingMessage::Qr { .. })
        ));
    }

    #[tokio::test]
    async fn terminal_message_closes_channel() {
        let streamer = PairingStreamer::new();
        let mut rx = streamer.subscribe().await;
        streamer
            .publish(PairingMessage::Success {
                phone: "15551234567".into(),
            })
            .await;
        assert!(matches!(
            rx.recv().await,
            Some(PairingMessage::Success { .. })
        ));
        // Sender was dropped after the terminal message.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn new_subscriber_replaces_old() {
        let streamer = PairingStreamer::new();
        let mut old = streamer.subscribe().await;
        let mut new = streamer.subscribe().await;

        streamer.publish(PairingMessage::Pong).await;
        assert!(old.recv().await.is_none());
        assert_eq!(new.recv().await, Some(PairingMessage::Pong));
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_noop() {
        let streamer = PairingStreamer::new();
        streamer
            .publish(PairingMessage::Error {
                message: "pairing timeout".into(),
            })
            .await;
        // A later subscriber sees nothing from before its subscription.
        let mut rx = streamer.subscribe().await;
        streamer.publish(PairingMessage::Pong).await;
        assert_eq!(rx.recv().await, Some(PairingMessage::Pong));
    }

    #[test]
    fn serializes_as_type_data_envelope() {
        let json = serde_json::to_string(&PairingMessage::Qr {
            code: "X".into(),
            expires_in_secs: 30,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"qr","data":{"code":"X","expires_in_secs":30}}"#);
    }
}
