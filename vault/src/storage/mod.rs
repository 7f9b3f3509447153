//! # Storage Module — Persistence
//!
//! sled-backed storage for vault snapshots, the event journal, and the
//! devnet asset ledger. One file: [`db`].

pub mod db;

pub use db::{DbError, DbResult, VaultDb};
