// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session pairing WebSocket.
//!
//! `GET /ws/{session_id}?token=...` authenticates during the handshake (the
//! browser WebSocket API cannot set headers), subscribes to the session's
//! pairing channel, and streams its messages as JSON. The channel closing —
//! after a terminal `success`/`error`, on disconnect, or when a newer
//! subscriber replaces this one — closes the socket.
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "qr", "data": {"code": "...", "expires_in_secs": 60}}
//! {"type": "success", "data": {"phone": "15551234567"}}
//! {"type": "error", "data": {"message": "pairing timeout"}}
//! {"type": "pong"}
//! ```
//!
//! Client `{"type": "ping"}` frames get a `pong` without touching pairing
//! state.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use wagate_core::GateError;
use wagate_session::PairingMessage;

use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

#[derive(Debug, Deserialize)]
struct WsIncoming {
    #[serde(rename = "type")]
    kind: String,
}

/// WebSocket upgrade handler for the pairing channel.
pub async fn pairing_ws(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match state.tokens.verify(&query.token) {
        Ok(identity) => identity,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    // Ownership and existence are checked before the upgrade so the client
    // gets a proper status instead of an immediately-closed socket.
    let pairing = match state.manager.subscribe_pairing(&identity, &session_id).await {
        Ok(rx) => rx,
        Err(GateError::NotFound) => return StatusCode::NOT_FOUND.into_response(),
        Err(GateError::Forbidden) => return StatusCode::FORBIDDEN.into_response(),
        Err(error) => {
            tracing::error!(%error, "pairing subscription failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    tracing::debug!(session_id = %session_id, user_id = %identity.user_id, "pairing socket opened");
    ws.on_upgrade(move |socket| handle_socket(socket, pairing))
}

async fn handle_socket(socket: WebSocket, mut pairing: mpsc::Receiver<PairingMessage>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            message = pairing.recv() => {
                let Some(message) = message else {
                    // Channel closed: terminal event, teardown, or replaced
                    // by a newer subscriber.
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let Ok(json) = serde_json::to_string(&message) else {
                    continue;
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let incoming: Result<WsIncoming, _> = serde_json::from_str(&text);
                        if matches!(incoming, Ok(WsIncoming { ref kind }) if kind == "ping") {
                            let Ok(pong) = serde_json::to_string(&PairingMessage::Pong) else {
                                continue;
                            };
                            if sender.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Binary and control frames are ignored.
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
