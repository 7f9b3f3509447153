//! # Yield Strategy Interface
//!
//! The strategy is where reserve-exceeding capital goes to work. The vault
//! treats it as opaque: deposit, withdraw, report value. Any failure from
//! the strategy aborts the enclosing vault operation — the engine never
//! papers over a failed external call, because doing so could mask lost
//! funds.
//!
//! [`SimStrategy`] is the reference implementation: it takes custody
//! through the shared asset ledger under its own holder id and simulates
//! interest by minting. Good enough for tests and the devnet daemon; the
//! production strategy wraps an external lending market.

use std::sync::Arc;

use thiserror::Error;

use super::asset::{AssetError, FungibleAsset, InMemoryAsset};
use crate::config::{BPS_DENOMINATOR, SECONDS_PER_YEAR};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from yield-strategy calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyError {
    /// Withdrawal larger than the strategy's current position.
    #[error("strategy holds {available}, withdrawal requested {requested}")]
    InsufficientAssets {
        /// The strategy's current position value.
        available: u128,
        /// The amount that was requested.
        requested: u128,
    },

    /// The underlying asset transfer failed.
    #[error("strategy asset transfer failed: {0}")]
    Asset(#[from] AssetError),
}

// ---------------------------------------------------------------------------
// YieldStrategy
// ---------------------------------------------------------------------------

/// A yield-bearing external position, as seen by the vault.
///
/// All amounts are in the underlying asset's smallest unit. Implementations
/// must never call back into the vault — the engine holds its state lock
/// across these calls.
pub trait YieldStrategy: Send + Sync {
    /// Deploys `amount` from the vault's reserve into the position.
    fn deposit(&self, amount: u128) -> Result<(), StrategyError>;

    /// Returns `amount` from the position to the vault's reserve.
    fn withdraw(&self, amount: u128) -> Result<(), StrategyError>;

    /// Unwinds the entire position back to the vault's reserve.
    fn withdraw_all(&self) -> Result<(), StrategyError>;

    /// Current value of the position, including accrued yield.
    fn total_assets(&self) -> u128;
}

// ---------------------------------------------------------------------------
// SimStrategy
// ---------------------------------------------------------------------------

/// Simulated lending-market strategy over the in-memory asset ledger.
///
/// Custody is real in the only sense that matters for testing: assets move
/// between the vault's holder id and the strategy's, so reserve and
/// position balances always reconcile against the asset ledger.
pub struct SimStrategy {
    asset: Arc<InMemoryAsset>,
    /// The vault's holder id on the asset ledger.
    vault_holder: String,
    /// The strategy's own holder id, where deployed capital sits.
    holder: String,
}

impl SimStrategy {
    pub fn new(asset: Arc<InMemoryAsset>, vault_holder: &str, holder: &str) -> Self {
        Self {
            asset,
            vault_holder: vault_holder.to_string(),
            holder: holder.to_string(),
        }
    }

    /// The strategy's holder id on the asset ledger.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Mints simulated interest onto the position: pro-rata share of
    /// `bps_per_year` for `elapsed_secs`. Returns the interest credited.
    ///
    /// Floor division throughout, so sub-second or dust-sized accruals
    /// may round to zero.
    pub fn accrue_yield(&self, bps_per_year: u32, elapsed_secs: u64) -> Result<u128, AssetError> {
        let principal = self.total_assets();
        if principal == 0 {
            return Ok(0);
        }

        let annual = principal.saturating_mul(bps_per_year as u128) / BPS_DENOMINATOR;
        let interest = annual.saturating_mul(elapsed_secs as u128) / SECONDS_PER_YEAR as u128;
        if interest > 0 {
            self.asset.mint(&self.holder, interest)?;
        }
        Ok(interest)
    }
}

impl YieldStrategy for SimStrategy {
    fn deposit(&self, amount: u128) -> Result<(), StrategyError> {
        self.asset
            .transfer(&self.vault_holder, &self.holder, amount)?;
        Ok(())
    }

    fn withdraw(&self, amount: u128) -> Result<(), StrategyError> {
        let available = self.total_assets();
        if amount > available {
            return Err(StrategyError::InsufficientAssets {
                available,
                requested: amount,
            });
        }
        self.asset
            .transfer(&self.holder, &self.vault_holder, amount)?;
        Ok(())
    }

    fn withdraw_all(&self) -> Result<(), StrategyError> {
        let position = self.total_assets();
        if position > 0 {
            self.asset
                .transfer(&self.holder, &self.vault_holder, position)?;
        }
        Ok(())
    }

    fn total_assets(&self) -> u128 {
        self.asset.balance_of(&self.holder)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UNIT;

    fn setup() -> (Arc<InMemoryAsset>, SimStrategy) {
        let asset = Arc::new(InMemoryAsset::new("cUSD"));
        asset.mint("vault", 10_000).unwrap();
        let strategy = SimStrategy::new(Arc::clone(&asset), "vault", "strategy");
        (asset, strategy)
    }

    #[test]
    fn deposit_moves_custody_to_strategy() {
        let (asset, strategy) = setup();

        strategy.deposit(4_000).unwrap();
        assert_eq!(strategy.total_assets(), 4_000);
        assert_eq!(asset.balance_of("vault"), 6_000);
    }

    #[test]
    fn withdraw_returns_custody_to_vault() {
        let (asset, strategy) = setup();
        strategy.deposit(4_000).unwrap();

        strategy.withdraw(1_500).unwrap();
        assert_eq!(strategy.total_assets(), 2_500);
        assert_eq!(asset.balance_of("vault"), 7_500);
    }

    #[test]
    fn withdraw_beyond_position_rejected() {
        let (_asset, strategy) = setup();
        strategy.deposit(1_000).unwrap();

        let err = strategy.withdraw(1_001).unwrap_err();
        assert_eq!(
            err,
            StrategyError::InsufficientAssets {
                available: 1_000,
                requested: 1_001,
            }
        );
        // Position untouched.
        assert_eq!(strategy.total_assets(), 1_000);
    }

    #[test]
    fn withdraw_all_unwinds_everything() {
        let (asset, strategy) = setup();
        strategy.deposit(9_999).unwrap();

        strategy.withdraw_all().unwrap();
        assert_eq!(strategy.total_assets(), 0);
        assert_eq!(asset.balance_of("vault"), 10_000);
    }

    #[test]
    fn withdraw_all_on_empty_position_is_noop() {
        let (_asset, strategy) = setup();
        strategy.withdraw_all().unwrap();
        assert_eq!(strategy.total_assets(), 0);
    }

    #[test]
    fn accrue_yield_mints_interest() {
        let asset = Arc::new(InMemoryAsset::new("cUSD"));
        asset.mint("vault", 1_000_000 * UNIT).unwrap();
        let strategy = SimStrategy::new(Arc::clone(&asset), "vault", "strategy");
        strategy.deposit(1_000_000 * UNIT).unwrap();

        // 3.5% APY over a full year.
        let interest = strategy.accrue_yield(350, SECONDS_PER_YEAR).unwrap();
        assert_eq!(interest, 35_000 * UNIT);
        assert_eq!(strategy.total_assets(), 1_035_000 * UNIT);
    }

    #[test]
    fn accrue_yield_on_empty_position_is_zero() {
        let (_asset, strategy) = setup();
        assert_eq!(strategy.accrue_yield(350, SECONDS_PER_YEAR).unwrap(), 0);
    }

    #[test]
    fn dust_accrual_floors_to_zero() {
        let (_asset, strategy) = setup();
        strategy.deposit(100).unwrap();
        // 100 units for one second at 3.5% rounds to nothing.
        assert_eq!(strategy.accrue_yield(350, 1).unwrap(), 0);
        assert_eq!(strategy.total_assets(), 100);
    }
}
