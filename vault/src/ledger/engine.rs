//! # Vault Engine
//!
//! The [`Vault`] is the aggregate that owns all ledger state: the share
//! pool, the account book, the event log, and the admin configuration.
//! Everything mutable sits behind a single `parking_lot::Mutex`, so each
//! operation runs as one isolated transaction — no interleaving of share
//! accounting reads and writes, ever.
//!
//! ## Ordering Discipline
//!
//! Within an operation, fallible collaborator calls (asset transfers,
//! strategy deposits/withdrawals) run *before* any ledger commit. A failed
//! external call therefore aborts with the share ledger untouched. The one
//! external call that can fail after funds have been pulled in — the
//! auto-deploy during a deposit — is compensated by returning the pulled
//! funds to the depositor.
//!
//! Collaborator implementations must not call back into the vault: the
//! state lock is held across their calls, and a reentrant call would
//! deadlock rather than corrupt the ledger. That is the intended failure
//! mode.
//!
//! ## Reserve Policy
//!
//! The vault targets `reserve_ratio_bps` of total assets held liquid.
//! Deposits auto-deploy anything above target. Withdrawals pull the
//! shortfall from the strategy, topped up so the reserve lands back on
//! target. `rebalance` corrects drift from yield accrual and donations,
//! with a hysteresis band: it only pushes excess once the reserve exceeds
//! twice the target.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::account::{AccountBook, PrincipalAccount};
use super::error::VaultError;
use super::events::{EventLog, SequencedEvent, VaultEvent};
use super::shares::{MathError, SharePool};
use crate::config::{
    self, apply_bps, DEFAULT_MAX_PER_PRINCIPAL, DEFAULT_MAX_TOTAL_ASSETS,
    DEFAULT_RESERVE_RATIO_BPS, LEDGER_VERSION, MIN_DEPOSIT, RESERVE_UPPER_BAND_FACTOR,
};
use crate::external::asset::FungibleAsset;
use crate::external::strategy::YieldStrategy;
use crate::external::verifier::Verifier;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Initial vault parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// The owner principal, authorized for admin operations.
    pub owner: String,
    /// Target fraction of total assets held as liquid reserve.
    pub reserve_ratio_bps: u32,
    /// Dust floor on deposits.
    pub min_deposit: u128,
    /// Per-principal deposit ceiling.
    pub max_per_principal: u128,
    /// Vault-wide total asset ceiling.
    pub max_total_assets: u128,
}

impl VaultConfig {
    /// Config with project defaults and the given owner.
    pub fn with_owner(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), VaultError> {
        if self.owner.is_empty() {
            return Err(VaultError::InvalidConfig {
                reason: "owner must not be empty".into(),
            });
        }
        if !config::reserve_ratio_is_valid(self.reserve_ratio_bps) {
            return Err(VaultError::InvalidConfig {
                reason: format!(
                    "reserve ratio {} bps exceeds the maximum of {}",
                    self.reserve_ratio_bps,
                    config::MAX_RESERVE_RATIO_BPS
                ),
            });
        }
        validate_limits(self.max_per_principal, self.max_total_assets)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            owner: "owner".to_string(),
            reserve_ratio_bps: DEFAULT_RESERVE_RATIO_BPS,
            min_deposit: MIN_DEPOSIT,
            max_per_principal: DEFAULT_MAX_PER_PRINCIPAL,
            max_total_assets: DEFAULT_MAX_TOTAL_ASSETS,
        }
    }
}

fn validate_limits(max_per_principal: u128, max_total_assets: u128) -> Result<(), VaultError> {
    if max_per_principal == 0 || max_total_assets == 0 {
        return Err(VaultError::InvalidConfig {
            reason: "deposit limits must be non-zero".into(),
        });
    }
    if max_per_principal > max_total_assets {
        return Err(VaultError::InvalidConfig {
            reason: "per-principal limit exceeds the total asset limit".into(),
        });
    }
    Ok(())
}

/// The current deposit ceilings, as exposed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultLimits {
    pub max_per_principal: u128,
    pub max_total_assets: u128,
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Returned by a successful deposit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub principal: String,
    /// Assets pulled in.
    pub assets: u128,
    /// Shares minted. May be zero at a donation-inflated price.
    pub shares: u128,
    /// The principal's share balance after the deposit.
    pub share_balance: u128,
    pub total_shares: u128,
    pub total_assets: u128,
    pub timestamp: DateTime<Utc>,
}

/// Returned by a successful withdrawal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    pub principal: String,
    /// Shares burned.
    pub shares: u128,
    /// Assets paid out.
    pub assets: u128,
    /// The principal's share balance after the withdrawal.
    pub share_balance: u128,
    pub total_shares: u128,
    pub total_assets: u128,
    pub timestamp: DateTime<Utc>,
}

/// Returned by `rebalance`, describing what (if anything) moved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// Assets pulled from the strategy into the reserve.
    pub pulled: u128,
    /// Assets pushed from the reserve into the strategy.
    pub pushed: u128,
    pub reserve_after: u128,
    pub target_reserve: u128,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Complete persistable ledger state. Asset and strategy balances are not
/// part of the snapshot — they live on their own ledgers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Snapshot layout version ([`LEDGER_VERSION`]).
    pub version: u32,
    pub total_shares: u128,
    pub accounts: HashMap<String, PrincipalAccount>,
    pub reserve_ratio_bps: u32,
    pub min_deposit: u128,
    pub max_per_principal: u128,
    pub max_total_assets: u128,
    pub paused: bool,
    pub owner: String,
    pub rebalancer: Option<String>,
    /// Sequence number the event log resumes from.
    pub next_event_seq: u64,
}

// ---------------------------------------------------------------------------
// VaultState
// ---------------------------------------------------------------------------

/// Everything mutable, guarded by the engine's mutex.
struct VaultState {
    pool: SharePool,
    accounts: AccountBook,
    events: EventLog,
    reserve_ratio_bps: u32,
    min_deposit: u128,
    max_per_principal: u128,
    max_total_assets: u128,
    paused: bool,
    owner: String,
    rebalancer: Option<String>,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The vault ledger and capital allocator.
pub struct Vault {
    state: Mutex<VaultState>,
    asset: Arc<dyn FungibleAsset>,
    strategy: Arc<dyn YieldStrategy>,
    verifier: Arc<dyn Verifier>,
    /// The vault's own holder id on the asset ledger. Its balance there
    /// is the reserve.
    holder: String,
}

impl Vault {
    /// Creates a fresh vault.
    pub fn new(
        config: VaultConfig,
        asset: Arc<dyn FungibleAsset>,
        strategy: Arc<dyn YieldStrategy>,
        verifier: Arc<dyn Verifier>,
        holder: &str,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(VaultState {
                pool: SharePool::new(),
                accounts: AccountBook::new(),
                events: EventLog::new(),
                reserve_ratio_bps: config.reserve_ratio_bps,
                min_deposit: config.min_deposit,
                max_per_principal: config.max_per_principal,
                max_total_assets: config.max_total_assets,
                paused: false,
                owner: config.owner,
                rebalancer: None,
            }),
            asset,
            strategy,
            verifier,
            holder: holder.to_string(),
        })
    }

    /// Reconstructs a vault from a persisted snapshot.
    pub fn restore(
        snapshot: VaultSnapshot,
        asset: Arc<dyn FungibleAsset>,
        strategy: Arc<dyn YieldStrategy>,
        verifier: Arc<dyn Verifier>,
        holder: &str,
    ) -> Result<Self, VaultError> {
        if snapshot.version != LEDGER_VERSION {
            return Err(VaultError::InvalidConfig {
                reason: format!(
                    "snapshot version {} does not match ledger version {}",
                    snapshot.version, LEDGER_VERSION
                ),
            });
        }
        let mut events = EventLog::new();
        events.resume_from(snapshot.next_event_seq);

        Ok(Self {
            state: Mutex::new(VaultState {
                pool: SharePool::with_supply(snapshot.total_shares),
                accounts: AccountBook::from_accounts(snapshot.accounts),
                events,
                reserve_ratio_bps: snapshot.reserve_ratio_bps,
                min_deposit: snapshot.min_deposit,
                max_per_principal: snapshot.max_per_principal,
                max_total_assets: snapshot.max_total_assets,
                paused: snapshot.paused,
                owner: snapshot.owner,
                rebalancer: snapshot.rebalancer,
            }),
            asset,
            strategy,
            verifier,
            holder: holder.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Core Operations
    // -----------------------------------------------------------------------

    /// Deposits `amount` of the underlying asset for `principal`, minting
    /// shares priced on the pre-deposit asset balance.
    pub fn deposit(&self, principal: &str, amount: u128) -> Result<DepositReceipt, VaultError> {
        let mut state = self.state.lock();

        if state.paused {
            return Err(VaultError::Paused);
        }
        if !self.verifier.is_verified(principal) {
            return Err(VaultError::NotVerified {
                principal: principal.to_string(),
            });
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount { amount });
        }
        if amount < state.min_deposit {
            return Err(VaultError::BelowMinimumDeposit {
                amount,
                minimum: state.min_deposit,
            });
        }

        // Totals read before pulling the deposit in: this is what makes
        // donations price-only and keeps the depositor from diluting
        // their own entry.
        let reserve_before = self.asset.balance_of(&self.holder);
        let total_before = checked_total(reserve_before, self.strategy.total_assets())?;

        let current_value = state
            .pool
            .assets_for_shares(state.accounts.share_balance(principal), total_before)?;
        let resulting = current_value.saturating_add(amount);
        if resulting > state.max_per_principal {
            return Err(VaultError::ExceedsPerPrincipalLimit {
                principal: principal.to_string(),
                current: current_value,
                deposit: amount,
                limit: state.max_per_principal,
            });
        }
        let total_after = checked_total(total_before, amount)?;
        if total_after > state.max_total_assets {
            return Err(VaultError::ExceedsTotalAssetLimit {
                current: total_before,
                deposit: amount,
                limit: state.max_total_assets,
            });
        }

        let shares = state.pool.shares_for_deposit(amount, total_before)?;

        // Pull the deposit into the reserve.
        self.asset.transfer(principal, &self.holder, amount)?;

        // Auto-deploy anything above the target reserve.
        let target = apply_bps(total_after, state.reserve_ratio_bps);
        let reserve_after = reserve_before.saturating_add(amount);
        if reserve_after > target {
            if let Err(e) = self.strategy.deposit(reserve_after - target) {
                // Compensate: the deposit never happened. The return
                // transfer cannot fail — the funds just arrived and the
                // lock was never released.
                warn!(principal, amount, error = %e, "auto-deploy failed, returning deposit");
                let _ = self.asset.transfer(&self.holder, principal, amount);
                return Err(e.into());
            }
        }

        // External calls done; commit the ledger.
        state.pool.issue(shares)?;
        state.accounts.record_deposit(principal, shares, amount);

        let timestamp = Utc::now();
        state.events.record(VaultEvent::Deposited {
            principal: principal.to_string(),
            assets: amount,
            shares,
            timestamp,
        });
        info!(
            principal,
            assets = amount,
            shares,
            total_shares = state.pool.total_shares(),
            "deposit committed"
        );

        Ok(DepositReceipt {
            principal: principal.to_string(),
            assets: amount,
            shares,
            share_balance: state.accounts.share_balance(principal),
            total_shares: state.pool.total_shares(),
            total_assets: total_after,
            timestamp,
        })
    }

    /// Withdraws an asset-denominated `assets` amount for `principal`,
    /// burning the equivalent shares at the current price.
    ///
    /// Available while paused. The caller's `min_assets_out` floor guards
    /// against the price moving between call construction and execution.
    pub fn withdraw(
        &self,
        principal: &str,
        assets: u128,
        min_assets_out: u128,
    ) -> Result<WithdrawReceipt, VaultError> {
        let mut state = self.state.lock();

        if assets == 0 {
            return Err(VaultError::InvalidAmount { amount: assets });
        }

        let reserve = self.asset.balance_of(&self.holder);
        let strategy_assets = self.strategy.total_assets();
        let total = checked_total(reserve, strategy_assets)?;

        let shares = state.pool.shares_for_assets(assets, total)?;
        if shares == 0 {
            // Too small to burn a single share at the current price.
            return Err(VaultError::InvalidAmount { amount: assets });
        }
        let held = state.accounts.share_balance(principal);
        if shares > held {
            return Err(VaultError::InsufficientShares {
                principal: principal.to_string(),
                available: held,
                requested: shares,
            });
        }

        // The double floor (assets -> shares -> assets) keeps the payout
        // at or below the requested amount. Solvency over generosity.
        let payout = state.pool.assets_for_shares(shares, total)?;
        if payout < min_assets_out {
            return Err(VaultError::SlippageTooHigh {
                payout,
                min_assets_out,
            });
        }

        self.settle_payout(&state, principal, payout, reserve, strategy_assets, total)?;
        self.commit_withdrawal(&mut state, principal, shares, payout, total)
    }

    /// Withdraws the principal's entire share balance. No slippage floor:
    /// a full exit is honored at whatever the current price is.
    ///
    /// An empty account exits vacuously — zero payout, no event.
    pub fn withdraw_all(&self, principal: &str) -> Result<WithdrawReceipt, VaultError> {
        let mut state = self.state.lock();

        let shares = state.accounts.share_balance(principal);
        let reserve = self.asset.balance_of(&self.holder);
        let strategy_assets = self.strategy.total_assets();
        let total = checked_total(reserve, strategy_assets)?;

        if shares == 0 {
            return Ok(WithdrawReceipt {
                principal: principal.to_string(),
                shares: 0,
                assets: 0,
                share_balance: 0,
                total_shares: state.pool.total_shares(),
                total_assets: total,
                timestamp: Utc::now(),
            });
        }

        let payout = state.pool.assets_for_shares(shares, total)?;
        self.settle_payout(&state, principal, payout, reserve, strategy_assets, total)?;
        self.commit_withdrawal(&mut state, principal, shares, payout, total)
    }

    /// Moves assets between reserve and strategy to restore the target
    /// reserve ratio. Owner or designated rebalancer only.
    pub fn rebalance(&self, caller: &str) -> Result<RebalanceReport, VaultError> {
        let mut state = self.state.lock();

        if state.paused {
            return Err(VaultError::Paused);
        }
        let authorized =
            caller == state.owner || state.rebalancer.as_deref() == Some(caller);
        if !authorized {
            return Err(VaultError::NotRebalancer {
                caller: caller.to_string(),
            });
        }

        let reserve = self.asset.balance_of(&self.holder);
        let strategy_assets = self.strategy.total_assets();
        let total = checked_total(reserve, strategy_assets)?;
        let target = apply_bps(total, state.reserve_ratio_bps);
        let upper_band = target.saturating_mul(RESERVE_UPPER_BAND_FACTOR);

        let (pulled, pushed) = if reserve < target {
            let pull = (target - reserve).min(strategy_assets);
            if pull > 0 {
                self.strategy.withdraw(pull)?;
            }
            (pull, 0)
        } else if reserve > upper_band {
            let push = reserve - target;
            self.strategy.deposit(push)?;
            (0, push)
        } else {
            // Inside the hysteresis band. Moving coins around here is
            // churn, not maintenance.
            (0, 0)
        };

        let reserve_after = self.asset.balance_of(&self.holder);
        if pulled > 0 || pushed > 0 {
            info!(pulled, pushed, reserve_after, target, "rebalance moved assets");
        } else {
            debug!(reserve, target, "rebalance no-op, reserve inside band");
        }
        let timestamp = Utc::now();
        state.events.record(VaultEvent::Rebalanced {
            pulled,
            pushed,
            reserve_after,
            timestamp,
        });

        Ok(RebalanceReport {
            pulled,
            pushed,
            reserve_after,
            target_reserve: target,
            timestamp,
        })
    }

    // -----------------------------------------------------------------------
    // Admin Operations (owner-gated)
    // -----------------------------------------------------------------------

    /// Updates the deposit ceilings. Blocked while paused.
    pub fn set_limits(
        &self,
        caller: &str,
        max_per_principal: u128,
        max_total_assets: u128,
    ) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        require_owner(&state, caller)?;
        if state.paused {
            return Err(VaultError::Paused);
        }
        validate_limits(max_per_principal, max_total_assets)?;

        state.max_per_principal = max_per_principal;
        state.max_total_assets = max_total_assets;
        info!(max_per_principal, max_total_assets, "deposit limits updated");
        state.events.record(VaultEvent::LimitsUpdated {
            max_per_principal,
            max_total_assets,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Sets or clears the delegated rebalancer.
    pub fn set_rebalancer(
        &self,
        caller: &str,
        rebalancer: Option<String>,
    ) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        require_owner(&state, caller)?;

        state.rebalancer = rebalancer.clone();
        state.events.record(VaultEvent::RebalancerUpdated {
            rebalancer,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Pauses the vault: deposits, rebalance, and limit changes are
    /// blocked until unpaused. Idempotent; only transitions are logged.
    pub fn pause(&self, caller: &str) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        require_owner(&state, caller)?;

        if !state.paused {
            state.paused = true;
            warn!(by = caller, "vault paused");
            state.events.record(VaultEvent::Paused {
                by: caller.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Unpauses the vault. Idempotent.
    pub fn unpause(&self, caller: &str) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        require_owner(&state, caller)?;

        if state.paused {
            state.paused = false;
            info!(by = caller, "vault unpaused");
            state.events.record(VaultEvent::Unpaused {
                by: caller.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Sweeps `amount` of an arbitrary asset from the vault's holdings to
    /// the owner. Meant for stuck or mistakenly-sent tokens.
    ///
    /// Sweeping the vault's own underlying asset requires the vault to be
    /// paused first — user principal can never be drained silently.
    pub fn emergency_withdraw(
        &self,
        caller: &str,
        asset: &dyn FungibleAsset,
        amount: u128,
    ) -> Result<(), VaultError> {
        let mut state = self.state.lock();
        require_owner(&state, caller)?;

        if asset.symbol() == self.asset.symbol() && !state.paused {
            return Err(VaultError::NotPaused);
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount { amount });
        }

        asset.transfer(&self.holder, &state.owner, amount)?;
        warn!(symbol = asset.symbol(), amount, "emergency sweep to owner");
        let to = state.owner.clone();
        state.events.record(VaultEvent::EmergencySweep {
            symbol: asset.symbol().to_string(),
            amount,
            to,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Reserve plus strategy-reported assets.
    pub fn total_assets(&self) -> u128 {
        self.asset
            .balance_of(&self.holder)
            .saturating_add(self.strategy.total_assets())
    }

    /// Assets held directly by the vault (immediately liquid).
    pub fn reserve_balance(&self) -> u128 {
        self.asset.balance_of(&self.holder)
    }

    /// Assets deployed into the strategy, at strategy-reported value.
    pub fn strategy_balance(&self) -> u128 {
        self.strategy.total_assets()
    }

    /// Outstanding share supply.
    pub fn total_shares(&self) -> u128 {
        self.state.lock().pool.total_shares()
    }

    /// The principal's share balance.
    pub fn shares_of(&self, principal: &str) -> u128 {
        self.state.lock().accounts.share_balance(principal)
    }

    /// Asset value of the principal's shares at the current price.
    pub fn balance_of(&self, principal: &str) -> u128 {
        let state = self.state.lock();
        let shares = state.accounts.share_balance(principal);
        state
            .pool
            .assets_for_shares(shares, self.total_assets_unlocked())
            .unwrap_or(0)
    }

    /// Lifetime earnings: current value plus everything withdrawn, minus
    /// everything deposited. Negative if the strategy lost money.
    pub fn earnings_of(&self, principal: &str) -> i128 {
        let state = self.state.lock();
        let Some(account) = state.accounts.get(principal) else {
            return 0;
        };
        let current = state
            .pool
            .assets_for_shares(account.share_balance, self.total_assets_unlocked())
            .unwrap_or(0);

        let gains = current.saturating_add(account.cumulative_withdrawn);
        saturating_i128(gains) - saturating_i128(account.cumulative_deposited)
    }

    /// The full account record, if the principal ever deposited.
    pub fn account(&self, principal: &str) -> Option<PrincipalAccount> {
        self.state.lock().accounts.get(principal).cloned()
    }

    /// Number of accounts ever created.
    pub fn account_count(&self) -> usize {
        self.state.lock().accounts.len()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn limits(&self) -> VaultLimits {
        let state = self.state.lock();
        VaultLimits {
            max_per_principal: state.max_per_principal,
            max_total_assets: state.max_total_assets,
        }
    }

    pub fn min_deposit(&self) -> u128 {
        self.state.lock().min_deposit
    }

    pub fn reserve_ratio_bps(&self) -> u32 {
        self.state.lock().reserve_ratio_bps
    }

    pub fn owner(&self) -> String {
        self.state.lock().owner.clone()
    }

    pub fn rebalancer(&self) -> Option<String> {
        self.state.lock().rebalancer.clone()
    }

    /// Events with sequence number >= `seq` still held in memory.
    pub fn events_since(&self, seq: u64) -> Vec<SequencedEvent> {
        self.state.lock().events.since(seq)
    }

    /// The `n` most recent events.
    pub fn latest_events(&self, n: usize) -> Vec<SequencedEvent> {
        self.state.lock().events.latest(n)
    }

    /// Sequence number the next event will be assigned.
    pub fn next_event_seq(&self) -> u64 {
        self.state.lock().events.next_seq()
    }

    /// Captures the complete ledger state for persistence.
    pub fn snapshot(&self) -> VaultSnapshot {
        let state = self.state.lock();
        VaultSnapshot {
            version: LEDGER_VERSION,
            total_shares: state.pool.total_shares(),
            accounts: state
                .accounts
                .iter()
                .map(|(p, a)| (p.clone(), a.clone()))
                .collect(),
            reserve_ratio_bps: state.reserve_ratio_bps,
            min_deposit: state.min_deposit,
            max_per_principal: state.max_per_principal,
            max_total_assets: state.max_total_assets,
            paused: state.paused,
            owner: state.owner.clone(),
            rebalancer: state.rebalancer.clone(),
            next_event_seq: state.events.next_seq(),
        }
    }

    /// Verifies the ledger's internal consistency. Test support — a
    /// violation means the engine itself is broken.
    pub fn check_invariants(&self) -> Result<(), String> {
        let state = self.state.lock();
        let sum = state.accounts.total_share_balance();
        let supply = state.pool.total_shares();
        if sum != supply {
            return Err(format!(
                "conservation violated: account shares sum to {sum}, supply is {supply}"
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal Helpers
    // -----------------------------------------------------------------------

    /// Total assets without taking the state lock (collaborator reads
    /// only). For use by views already holding the lock.
    fn total_assets_unlocked(&self) -> u128 {
        self.asset
            .balance_of(&self.holder)
            .saturating_add(self.strategy.total_assets())
    }

    /// Ensures the reserve can cover `payout`, pulling from the strategy
    /// when needed, then pays the principal.
    ///
    /// The pull is sized to leave the reserve at the post-withdrawal
    /// target, clamped to what the strategy actually holds — one strategy
    /// round-trip serves both the payout and reserve restoration.
    fn settle_payout(
        &self,
        state: &VaultState,
        principal: &str,
        payout: u128,
        reserve: u128,
        strategy_assets: u128,
        total: u128,
    ) -> Result<(), VaultError> {
        let total_after = total.saturating_sub(payout);
        let target_after = apply_bps(total_after, state.reserve_ratio_bps);
        let desired = payout.saturating_add(target_after);

        if desired > reserve {
            let pull = (desired - reserve).min(strategy_assets);
            if pull > 0 {
                self.strategy.withdraw(pull)?;
            }
            // Re-read the asset ledger rather than trusting the pull
            // arithmetic: a strategy that overstates total_assets()
            // delivers less than the nominal pull.
            let liquid = self.asset.balance_of(&self.holder);
            if liquid < payout {
                warn!(
                    principal,
                    requested = payout,
                    available = liquid,
                    "strategy pull left the reserve short of the payout"
                );
                return Err(VaultError::InsufficientLiquidity {
                    requested: payout,
                    available: liquid,
                });
            }
        }

        self.asset.transfer(&self.holder, principal, payout)?;
        Ok(())
    }

    /// Burns shares, updates the account, records the event, and builds
    /// the receipt. Runs after all external calls succeeded.
    fn commit_withdrawal(
        &self,
        state: &mut VaultState,
        principal: &str,
        shares: u128,
        payout: u128,
        total_before: u128,
    ) -> Result<WithdrawReceipt, VaultError> {
        state.pool.burn(shares)?;
        state
            .accounts
            .record_withdrawal(principal, shares, payout)
            .ok_or(VaultError::InsufficientShares {
                principal: principal.to_string(),
                // Unreachable: balance was checked under this same lock.
                available: 0,
                requested: shares,
            })?;

        let timestamp = Utc::now();
        state.events.record(VaultEvent::Withdrawn {
            principal: principal.to_string(),
            shares,
            assets: payout,
            timestamp,
        });
        info!(
            principal,
            shares,
            assets = payout,
            total_shares = state.pool.total_shares(),
            "withdrawal committed"
        );

        Ok(WithdrawReceipt {
            principal: principal.to_string(),
            shares,
            assets: payout,
            share_balance: state.accounts.share_balance(principal),
            total_shares: state.pool.total_shares(),
            total_assets: total_before.saturating_sub(payout),
            timestamp,
        })
    }
}

fn require_owner(state: &VaultState, caller: &str) -> Result<(), VaultError> {
    if caller != state.owner {
        return Err(VaultError::NotOwner {
            caller: caller.to_string(),
        });
    }
    Ok(())
}

fn checked_total(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow { a, b })
}

fn saturating_i128(value: u128) -> i128 {
    i128::try_from(value).unwrap_or(i128::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
