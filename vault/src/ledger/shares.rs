//! # Share Conversion Math
//!
//! Shares are the vault's internal unit of proportional ownership: a
//! depositor holding `s` shares out of `T` total owns `s/T` of the vault's
//! assets, wherever those assets happen to be parked (reserve or strategy).
//!
//! Two rules keep the model manipulation-resistant:
//!
//! 1. **Pre-deposit basis.** Shares for a deposit are priced against the
//!    asset balance *before* the deposit lands, so a depositor's own funds
//!    never dilute their own entry price.
//! 2. **1:1 bootstrap.** The first deposit mints exactly `amount` shares.
//!    An attacker donating raw assets to the vault (bypassing `deposit`)
//!    only raises the share price for existing holders — donations mint
//!    nothing for the donor.
//!
//! All conversions floor. Rounding dust stays in the vault, owned pro rata
//! by everyone — it never leaks out to a caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from share/asset conversion arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MathError {
    /// A `u128` multiplication overflowed.
    ///
    /// The deposit ceilings keep real amounts far below this territory;
    /// hitting it means someone fed the ledger garbage.
    #[error("arithmetic overflow: {a} * {b}")]
    Overflow {
        /// Left operand of the failed multiplication.
        a: u128,
        /// Right operand of the failed multiplication.
        b: u128,
    },

    /// Share supply underflow: attempted to burn more shares than exist.
    #[error("share supply underflow: total {total}, burn {burn}")]
    SupplyUnderflow {
        /// Total shares outstanding before the failed burn.
        total: u128,
        /// The amount that was requested.
        burn: u128,
    },
}

/// Computes `floor(a * b / denom)` with checked multiplication.
///
/// The denominator must be non-zero — callers guard that structurally
/// (every call site divides by a supply or balance already checked `> 0`).
pub fn mul_div(a: u128, b: u128, denom: u128) -> Result<u128, MathError> {
    debug_assert!(denom != 0, "mul_div denominator must be non-zero");
    let product = a.checked_mul(b).ok_or(MathError::Overflow { a, b })?;
    Ok(product / denom)
}

// ---------------------------------------------------------------------------
// SharePool
// ---------------------------------------------------------------------------

/// The vault's outstanding share supply and its conversion rules.
///
/// `SharePool` owns no asset balances — it is pure accounting. The engine
/// feeds it asset totals read from the asset ledger and the strategy, and
/// it answers "how many shares for this deposit" and "how many assets for
/// these shares".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SharePool {
    /// Sum of all principals' share balances.
    total_shares: u128,
}

impl SharePool {
    /// Creates an empty pool (zero shares outstanding).
    pub fn new() -> Self {
        Self { total_shares: 0 }
    }

    /// Reconstructs a pool from a persisted share supply.
    pub fn with_supply(total_shares: u128) -> Self {
        Self { total_shares }
    }

    /// Returns the outstanding share supply.
    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    /// Returns `true` if no shares have been minted yet.
    pub fn is_empty(&self) -> bool {
        self.total_shares == 0
    }

    /// Shares to mint for depositing `amount`, priced against the asset
    /// balance read *before* the deposit was pulled in.
    ///
    /// Bootstrap case: an empty pool mints 1:1. Otherwise
    /// `amount * total_shares / total_assets_before`, floored. At a
    /// donation-inflated price this can legitimately floor to zero —
    /// the caller decides whether a zero-share mint is acceptable.
    pub fn shares_for_deposit(
        &self,
        amount: u128,
        total_assets_before: u128,
    ) -> Result<u128, MathError> {
        if self.total_shares == 0 {
            return Ok(amount);
        }
        // A non-empty pool with zero assets means every prior deposit was
        // lost by the strategy. Re-bootstrap rather than divide by zero.
        if total_assets_before == 0 {
            return Ok(amount);
        }
        mul_div(amount, self.total_shares, total_assets_before)
    }

    /// Assets owed for burning `shares` at the current price:
    /// `shares * total_assets / total_shares`, floored.
    pub fn assets_for_shares(&self, shares: u128, total_assets: u128) -> Result<u128, MathError> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        mul_div(shares, total_assets, self.total_shares)
    }

    /// Shares equivalent to an asset-denominated amount at the current
    /// price: `assets * total_shares / total_assets`, floored. Inverse of
    /// [`assets_for_shares`](Self::assets_for_shares), used by the
    /// asset-denominated withdrawal path.
    pub fn shares_for_assets(&self, assets: u128, total_assets: u128) -> Result<u128, MathError> {
        if self.total_shares == 0 || total_assets == 0 {
            return Ok(0);
        }
        mul_div(assets, self.total_shares, total_assets)
    }

    /// Adds newly minted shares to the supply.
    pub fn issue(&mut self, shares: u128) -> Result<u128, MathError> {
        self.total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(MathError::Overflow {
                a: self.total_shares,
                b: shares,
            })?;
        Ok(self.total_shares)
    }

    /// Removes burned shares from the supply.
    pub fn burn(&mut self, shares: u128) -> Result<u128, MathError> {
        self.total_shares =
            self.total_shares
                .checked_sub(shares)
                .ok_or(MathError::SupplyUnderflow {
                    total: self.total_shares,
                    burn: shares,
                })?;
        Ok(self.total_shares)
    }
}

impl Default for SharePool {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
