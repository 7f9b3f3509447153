//! # External Collaborators
//!
//! The vault composes with three narrow interfaces it does not implement
//! itself: the underlying asset ledger, the yield strategy, and the
//! identity verifier. Each module defines the trait plus a reference
//! implementation good enough for tests and the devnet daemon.
//!
//! The contract all three share: no callbacks into the vault. The engine
//! holds its state lock across collaborator calls.

pub mod asset;
pub mod strategy;
pub mod verifier;

pub use asset::{AssetError, FungibleAsset, InMemoryAsset};
pub use strategy::{SimStrategy, StrategyError, YieldStrategy};
pub use verifier::{AllowlistVerifier, OpenVerifier, Verifier};
