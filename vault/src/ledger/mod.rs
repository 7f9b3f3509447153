//! # Ledger Module — Share Accounting & Capital Allocation
//!
//! This is where the vault's books live. Every share minted, every asset
//! paid out, every pause and rebalance passes through this module.
//!
//! ## Architecture
//!
//! ```text
//! shares.rs   — Share conversion math: mul_div, SharePool, bootstrap rule
//! account.rs  — Per-principal records and the account registry
//! error.rs    — The full error taxonomy, one variant per failure mode
//! events.rs   — Audit-trail events and the bounded in-memory log
//! engine.rs   — The Vault aggregate: operations, invariants, snapshots
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u128` in smallest-unit denomination.** No floats,
//!    no decimals in arithmetic, explicit checked operations everywhere a
//!    quantity is computed.
//!
//! 2. **One lock, whole operations.** The engine's mutex spans each
//!    operation end to end. There is no observable intermediate state.
//!
//! 3. **Floor division favors the vault.** Rounding dust accrues to all
//!    shareholders pro rata instead of leaking to whoever withdraws first.
//!
//! 4. **Serializable state.** Accounts, events, and snapshots all derive
//!    `Serialize`/`Deserialize` for persistence and the HTTP surface.

pub mod account;
pub mod engine;
pub mod error;
pub mod events;
pub mod shares;

pub use account::{AccountBook, PrincipalAccount};
pub use engine::{
    DepositReceipt, RebalanceReport, Vault, VaultConfig, VaultLimits, VaultSnapshot,
    WithdrawReceipt,
};
pub use error::VaultError;
pub use events::{EventLog, SequencedEvent, VaultEvent};
pub use shares::{mul_div, MathError, SharePool};
