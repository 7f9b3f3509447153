//! # Vault Error Taxonomy
//!
//! Every way a vault operation can fail, named specifically enough that a
//! calling UI can render an actionable message — "you're not verified" and
//! "the vault is paused" are different problems with different fixes.
//!
//! Every error aborts the enclosing operation atomically. There is no
//! partial-failure variant because there is no partial failure: the engine
//! orders its fallible collaborator calls before ledger commits.

use thiserror::Error;

use super::shares::MathError;
use crate::external::asset::AssetError;
use crate::external::strategy::StrategyError;

/// Errors returned by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    // -- Authorization ------------------------------------------------------
    /// The depositor is not known to the verifier. Gates deposits only —
    /// a once-verified principal can always withdraw.
    #[error("principal {principal} is not verified")]
    NotVerified {
        /// The principal that failed verification.
        principal: String,
    },

    /// An owner-only operation was attempted by someone else.
    #[error("caller {caller} is not the vault owner")]
    NotOwner {
        /// The unauthorized caller.
        caller: String,
    },

    /// Rebalance attempted by a caller that is neither the owner nor the
    /// designated rebalancer.
    #[error("caller {caller} is not authorized to rebalance")]
    NotRebalancer {
        /// The unauthorized caller.
        caller: String,
    },

    // -- Validation ---------------------------------------------------------
    /// Zero-amount operation, or a withdrawal too small to burn a single
    /// share at the current price.
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: u128,
    },

    /// Deposit below the dust floor.
    #[error("deposit {amount} is below the minimum of {minimum}")]
    BelowMinimumDeposit {
        /// The rejected deposit amount.
        amount: u128,
        /// The configured minimum deposit.
        minimum: u128,
    },

    /// The deposit would push the principal's holdings past the
    /// per-principal ceiling.
    #[error(
        "deposit would exceed per-principal limit: \
         {principal} holds {current}, deposit {deposit}, limit {limit}"
    )]
    ExceedsPerPrincipalLimit {
        /// The depositing principal.
        principal: String,
        /// Asset value of the principal's current holdings.
        current: u128,
        /// The rejected deposit amount.
        deposit: u128,
        /// The per-principal ceiling.
        limit: u128,
    },

    /// The deposit would push vault-wide total assets past the TVL cap.
    #[error("deposit would exceed total asset limit: current {current}, deposit {deposit}, limit {limit}")]
    ExceedsTotalAssetLimit {
        /// Total assets before the rejected deposit.
        current: u128,
        /// The rejected deposit amount.
        deposit: u128,
        /// The vault-wide ceiling.
        limit: u128,
    },

    /// Withdrawal larger than the principal's share balance covers.
    #[error("insufficient shares: {principal} holds {available}, requested {requested}")]
    InsufficientShares {
        /// The withdrawing principal.
        principal: String,
        /// Shares actually held.
        available: u128,
        /// Shares the withdrawal would burn.
        requested: u128,
    },

    /// Rejected configuration change (limits out of order, reserve ratio
    /// out of range).
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the requested configuration.
        reason: String,
    },

    // -- Safety checks ------------------------------------------------------
    /// The computed payout fell below the caller's slippage floor.
    #[error("payout {payout} is below the minimum assets out {min_assets_out}")]
    SlippageTooHigh {
        /// The payout the vault would have made.
        payout: u128,
        /// The caller's floor.
        min_assets_out: u128,
    },

    /// The reserve plus everything the strategy could return still does
    /// not cover the payout.
    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity {
        /// The payout that could not be covered.
        requested: u128,
        /// Liquid assets actually available after the strategy pull.
        available: u128,
    },

    // -- State --------------------------------------------------------------
    /// Deposits, rebalance, and limit changes are blocked while paused.
    /// Withdrawals are not — pause must never trap user funds.
    #[error("vault is paused")]
    Paused,

    /// Sweeping the vault's own underlying asset is only permitted while
    /// paused, so draining user principal is a loud two-step admin action.
    #[error("operation requires the vault to be paused")]
    NotPaused,

    // -- Propagated collaborator failures -----------------------------------
    /// Share-conversion arithmetic failure.
    #[error("share math error: {0}")]
    Math(#[from] MathError),

    /// Underlying asset transfer failure.
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),

    /// Yield-strategy call failure.
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
}

impl VaultError {
    /// True for errors where the caller lacked permission.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            VaultError::NotVerified { .. }
                | VaultError::NotOwner { .. }
                | VaultError::NotRebalancer { .. }
        )
    }

    /// True for errors caused by a malformed or out-of-bounds request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VaultError::InvalidAmount { .. }
                | VaultError::BelowMinimumDeposit { .. }
                | VaultError::ExceedsPerPrincipalLimit { .. }
                | VaultError::ExceedsTotalAssetLimit { .. }
                | VaultError::InsufficientShares { .. }
                | VaultError::InvalidConfig { .. }
        )
    }

    /// True for runtime safety-check failures: the request was well formed
    /// but state moved against it. Retryable from the caller's side.
    pub fn is_safety_check(&self) -> bool {
        matches!(
            self,
            VaultError::SlippageTooHigh { .. } | VaultError::InsufficientLiquidity { .. }
        )
    }
}
