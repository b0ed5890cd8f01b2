// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session layer: registry, lifecycle manager, pairing streamer, ownership
//! guard, and the login rate limiter.

pub mod manager;
pub mod ownership;
pub mod pairing;
pub mod rate_limit;
pub mod registry;

pub use manager::{CreateSession, SessionManager};
pub use pairing::{PairingMessage, PairingStreamer};
pub use rate_limit::LoginRateLimiter;
pub use registry::{Registry, SessionHandle};
