// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket API surface: bearer-token auth, session and job REST
//! handlers, the login endpoint, and the per-session pairing WebSocket.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{StaticCredentialVerifier, TokenService};
pub use server::{GatewayState, ServerConfig, build_router, start_server};
