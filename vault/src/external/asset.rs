//! # Underlying Asset Interface
//!
//! The vault holds and moves a single fungible asset it does not own the
//! ledger for. [`FungibleAsset`] is the seam: `balance_of` plus pull/push
//! `transfer`, nothing more. The production deployment points this at the
//! real token contract's RPC adapter; tests and the devnet daemon use
//! [`InMemoryAsset`].
//!
//! Implementations must never call back into the vault — the engine holds
//! its state lock across transfers.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from asset ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    /// Transfer larger than the sender's balance.
    #[error("insufficient asset balance: {holder} has {available}, requested {requested}")]
    InsufficientBalance {
        /// The holder being debited.
        holder: String,
        /// The holder's current balance.
        available: u128,
        /// The amount that was requested.
        requested: u128,
    },

    /// A credit would overflow the recipient's `u128` balance.
    #[error("asset balance overflow: {holder} holds {current}, credit {credit}")]
    Overflow {
        /// The holder being credited.
        holder: String,
        /// Balance before the failed credit.
        current: u128,
        /// The amount that caused the overflow.
        credit: u128,
    },
}

// ---------------------------------------------------------------------------
// FungibleAsset
// ---------------------------------------------------------------------------

/// A fungible token ledger, as seen by the vault.
///
/// Holders are opaque string identities — the same namespace the vault
/// uses for principals, plus the vault's and strategy's own holder ids.
pub trait FungibleAsset: Send + Sync {
    /// Ticker symbol, used for event reporting and the emergency-sweep
    /// same-asset guard.
    fn symbol(&self) -> &str;

    /// Current balance of a holder. Unknown holders have zero.
    fn balance_of(&self, holder: &str) -> u128;

    /// Moves `amount` from one holder to another. Atomic: on error,
    /// neither balance changes.
    fn transfer(&self, from: &str, to: &str, amount: u128) -> Result<(), AssetError>;
}

// ---------------------------------------------------------------------------
// InMemoryAsset
// ---------------------------------------------------------------------------

/// Reference asset ledger backed by a `HashMap` behind an `RwLock`.
///
/// `mint` exists for test setup and the devnet faucet; a production asset
/// obviously does not hand out supply on request.
pub struct InMemoryAsset {
    symbol: String,
    holdings: RwLock<HashMap<String, u128>>,
}

impl InMemoryAsset {
    /// Creates an empty ledger for the given ticker symbol.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            holdings: RwLock::new(HashMap::new()),
        }
    }

    /// Credits newly created supply to a holder.
    pub fn mint(&self, holder: &str, amount: u128) -> Result<u128, AssetError> {
        let mut holdings = self.holdings.write();
        let balance = holdings.entry(holder.to_string()).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(AssetError::Overflow {
            holder: holder.to_string(),
            current: *balance,
            credit: amount,
        })?;
        Ok(*balance)
    }

    /// All non-zero holdings as `(holder, balance)` pairs. Used by the
    /// daemon to persist the devnet ledger.
    pub fn all_holdings(&self) -> Vec<(String, u128)> {
        self.holdings
            .read()
            .iter()
            .filter(|(_, b)| **b > 0)
            .map(|(h, b)| (h.clone(), *b))
            .collect()
    }

    /// Sum of all balances. Conserved by `transfer`, grown only by `mint`.
    pub fn total_supply(&self) -> u128 {
        self.holdings
            .read()
            .values()
            .fold(0u128, |acc, b| acc.saturating_add(*b))
    }
}

impl FungibleAsset for InMemoryAsset {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn balance_of(&self, holder: &str) -> u128 {
        self.holdings.read().get(holder).copied().unwrap_or(0)
    }

    fn transfer(&self, from: &str, to: &str, amount: u128) -> Result<(), AssetError> {
        if amount == 0 {
            return Ok(());
        }
        let mut holdings = self.holdings.write();

        let from_balance = holdings.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(AssetError::InsufficientBalance {
                holder: from.to_string(),
                available: from_balance,
                requested: amount,
            });
        }

        let to_balance = holdings.get(to).copied().unwrap_or(0);
        let to_after = to_balance.checked_add(amount).ok_or(AssetError::Overflow {
            holder: to.to_string(),
            current: to_balance,
            credit: amount,
        })?;

        // Both sides validated; commit under the same write guard.
        holdings.insert(from.to_string(), from_balance - amount);
        holdings.insert(to.to_string(), to_after);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
