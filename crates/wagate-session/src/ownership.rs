// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ownership guard: every session operation except create runs through here.
//!
//! Admins bypass the owner check; everyone else must own the session. The
//! caller is responsible for reading the owner under the same lock it uses
//! for the subsequent action, so a concurrent delete cannot tear the check
//! from the act.

use wagate_core::GateError;
use wagate_core::types::Identity;

/// Authorize `identity` to operate on a session owned by `owner_id`.
pub fn authorize(identity: &Identity, owner_id: &str) -> Result<(), GateError> {
    if identity.is_admin() || identity.user_id == owner_id {
        Ok(())
    } else {
        Err(GateError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wagate_core::types::Role;

    #[test]
    fn owner_is_authorized() {
        let identity = Identity::new("alice", Role::User);
        assert!(authorize(&identity, "alice").is_ok());
    }

    #[test]
    fn non_owner_is_forbidden() {
        let identity = Identity::new("bob", Role::User);
        assert!(matches!(
            authorize(&identity, "alice"),
            Err(GateError::Forbidden)
        ));
    }

    #[test]
    fn admin_bypasses_ownership() {
        let identity = Identity::new("root", Role::Admin);
        assert!(authorize(&identity, "alice").is_ok());
    }
}
