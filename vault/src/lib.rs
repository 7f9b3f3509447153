// Copyright (c) 2026 Attestify Labs. MIT License.
// See LICENSE for details.

//! # Attestify Vault — Core Library
//!
//! Share-accounting vault ledger and capital allocator. Deposits buy
//! proportional ownership units ("shares") of a pooled asset position
//! split between a liquid reserve and a yield-bearing strategy; the
//! ledger keeps that split on target and the share price honest.
//!
//! ## Architecture
//!
//! - **ledger** — Share math, accounts, the vault engine, errors, events.
//! - **external** — Collaborator seams: asset, strategy, verifier.
//! - **storage** — sled-backed persistence for snapshots and the journal.
//! - **config** — Protocol constants and deployment defaults.
//!
//! ## Design Philosophy
//!
//! 1. The share price never goes down except by strategy losses. Not by
//!    rounding, not by donations, not by anyone else's withdrawal.
//! 2. Every mutating operation is atomic: one lock, all-or-nothing.
//! 3. Pause stops money coming in, never money going out.
//! 4. If it touches balances, it has tests. Plural.

pub mod config;
pub mod external;
pub mod ledger;
pub mod storage;
