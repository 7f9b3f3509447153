//! # Identity Verifier Interface
//!
//! The verifier answers exactly one question: may this principal deposit?
//! How it decides — zk-proof of personhood, KYC registry, hardcoded yes —
//! is entirely its business. Verification gates deposits only; withdrawal
//! rights are never revoked, so a principal whose verification lapses can
//! always exit.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Read-only deposit-permission oracle.
pub trait Verifier: Send + Sync {
    /// Returns `true` if the principal is allowed to deposit.
    fn is_verified(&self, principal: &str) -> bool;
}

/// Verifier backed by an explicit allowlist.
///
/// The daemon mutates the set through `allow`/`revoke` as the upstream
/// identity flow confirms or expires proofs.
#[derive(Default)]
pub struct AllowlistVerifier {
    allowed: RwLock<HashSet<String>>,
}

impl AllowlistVerifier {
    /// Creates an empty allowlist (nobody may deposit).
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a principal as verified.
    pub fn allow(&self, principal: &str) {
        self.allowed.write().insert(principal.to_string());
    }

    /// Revokes a principal's verification. Blocks future deposits only —
    /// existing shares remain withdrawable.
    pub fn revoke(&self, principal: &str) {
        self.allowed.write().remove(principal);
    }

    /// Number of currently verified principals.
    pub fn len(&self) -> usize {
        self.allowed.read().len()
    }

    /// Returns `true` if nobody is verified.
    pub fn is_empty(&self) -> bool {
        self.allowed.read().is_empty()
    }
}

impl Verifier for AllowlistVerifier {
    fn is_verified(&self, principal: &str) -> bool {
        self.allowed.read().contains(principal)
    }
}

/// Verifier that accepts everyone. Tests and devnet only.
#[derive(Default)]
pub struct OpenVerifier;

impl Verifier for OpenVerifier {
    fn is_verified(&self, _principal: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_starts_empty() {
        let verifier = AllowlistVerifier::new();
        assert!(verifier.is_empty());
        assert!(!verifier.is_verified("alice"));
    }

    #[test]
    fn allow_and_revoke() {
        let verifier = AllowlistVerifier::new();

        verifier.allow("alice");
        assert!(verifier.is_verified("alice"));
        assert!(!verifier.is_verified("bob"));
        assert_eq!(verifier.len(), 1);

        verifier.revoke("alice");
        assert!(!verifier.is_verified("alice"));
    }

    #[test]
    fn revoking_unknown_principal_is_harmless() {
        let verifier = AllowlistVerifier::new();
        verifier.revoke("ghost");
        assert!(verifier.is_empty());
    }

    #[test]
    fn open_verifier_accepts_anyone() {
        let verifier = OpenVerifier;
        assert!(verifier.is_verified("alice"));
        assert!(verifier.is_verified(""));
    }
}
