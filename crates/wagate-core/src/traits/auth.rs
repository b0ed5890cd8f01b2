// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential verification trait for the login endpoint.
//!
//! User/credential storage is an external collaborator; Wagate only needs
//! "given a username and password, who is this". The login rate limiter
//! wraps every call through this trait.

use async_trait::async_trait;

use crate::error::GateError;
use crate::types::Identity;

/// Verifies login credentials and resolves them to an identity.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Returns the caller's identity on success, `Forbidden` on bad
    /// credentials.
    async fn verify(&self, username: &str, password: &str) -> Result<Identity, GateError>;
}
