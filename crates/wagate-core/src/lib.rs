// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Wagate gateway.
//!
//! Provides the error taxonomy, common types, and the trait seams to the
//! external protocol client and credential store. Everything else in the
//! workspace builds on this crate.

pub mod error;
pub mod traits;
pub mod types;

pub use error::GateError;
pub use traits::{ClientFactory, CredentialVerifier, ProtocolClient};
pub use types::{Identity, JobKind, JobRecord, JobStatus, MessageId, Role, SessionRecord};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_types_are_exported_at_crate_root() {
        let _id = Identity::new("u1", Role::User);
        let _err = GateError::NotFound;
        let _status = JobStatus::Pending;
        fn _assert_client<T: ProtocolClient>() {}
        fn _assert_factory<T: ClientFactory>() {}
        fn _assert_verifier<T: CredentialVerifier>() {}
    }
}
