// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for Wagate's external collaborators.
//!
//! Traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod auth;
pub mod client;

pub use auth::CredentialVerifier;
pub use client::{ClientFactory, ProtocolClient};
