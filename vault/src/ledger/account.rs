//! # Principal Accounts
//!
//! A [`PrincipalAccount`] is the per-depositor record: share balance plus
//! cumulative deposit/withdrawal counters for earnings reporting. Accounts
//! are created implicitly on first deposit and never destroyed — a
//! zero-share account is indistinguishable from one that never existed.
//!
//! The [`AccountBook`] is the registry of all accounts. It enforces nothing
//! on its own beyond non-negative balances; the engine holds the global
//! invariants (conservation against the share supply, limit checks).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PrincipalAccount
// ---------------------------------------------------------------------------

/// Per-depositor ledger record.
///
/// The `cumulative_*` counters only ever grow. Earnings are derived:
/// current share value plus everything withdrawn, minus everything
/// deposited. All three survive a balance going to zero, so a principal
/// who fully exits and later returns keeps their lifetime history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrincipalAccount {
    /// This principal's slice of the vault's total share supply.
    pub share_balance: u128,

    /// Lifetime sum of assets deposited through `deposit`.
    pub cumulative_deposited: u128,

    /// Lifetime sum of assets paid out through withdrawals.
    pub cumulative_withdrawn: u128,

    /// Timestamp of the last deposit or withdrawal touching this account.
    pub last_action: DateTime<Utc>,
}

impl PrincipalAccount {
    /// Creates a zeroed account. Called implicitly on first deposit.
    pub fn new() -> Self {
        Self {
            share_balance: 0,
            cumulative_deposited: 0,
            cumulative_withdrawn: 0,
            last_action: Utc::now(),
        }
    }

    /// Returns `true` if this account holds no shares.
    pub fn is_empty(&self) -> bool {
        self.share_balance == 0
    }
}

impl Default for PrincipalAccount {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// AccountBook
// ---------------------------------------------------------------------------

/// Registry of all principal accounts, keyed by principal identity.
///
/// Not thread-safe by itself — the engine serializes access behind its
/// state mutex.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountBook {
    accounts: HashMap<String, PrincipalAccount>,
}

impl AccountBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    /// Reconstructs a book from persisted accounts.
    pub fn from_accounts(accounts: HashMap<String, PrincipalAccount>) -> Self {
        Self { accounts }
    }

    /// Returns the account for a principal, if one was ever created.
    pub fn get(&self, principal: &str) -> Option<&PrincipalAccount> {
        self.accounts.get(principal)
    }

    /// Returns the principal's share balance; zero for unknown principals.
    pub fn share_balance(&self, principal: &str) -> u128 {
        self.accounts
            .get(principal)
            .map(|a| a.share_balance)
            .unwrap_or(0)
    }

    /// Records a completed deposit: credits shares and bumps the
    /// cumulative-deposited counter. Creates the account on first use.
    ///
    /// The caller has already validated limits and minted the shares in
    /// the pool — this is pure bookkeeping and cannot fail short of a
    /// `u128` overflow, which the pool-level checked mint already rules out
    /// (an account balance is bounded by the total supply).
    pub fn record_deposit(&mut self, principal: &str, shares: u128, assets: u128) {
        let account = self
            .accounts
            .entry(principal.to_string())
            .or_insert_with(PrincipalAccount::new);
        account.share_balance = account.share_balance.saturating_add(shares);
        account.cumulative_deposited = account.cumulative_deposited.saturating_add(assets);
        account.last_action = Utc::now();
    }

    /// Records a completed withdrawal: debits shares and bumps the
    /// cumulative-withdrawn counter.
    ///
    /// Returns the remaining share balance, or `None` if the account does
    /// not exist or holds fewer shares than requested — the engine treats
    /// that as a bug in its own precondition checks, not a user error.
    pub fn record_withdrawal(
        &mut self,
        principal: &str,
        shares: u128,
        assets: u128,
    ) -> Option<u128> {
        let account = self.accounts.get_mut(principal)?;
        if account.share_balance < shares {
            return None;
        }
        account.share_balance -= shares;
        account.cumulative_withdrawn = account.cumulative_withdrawn.saturating_add(assets);
        account.last_action = Utc::now();
        Some(account.share_balance)
    }

    /// Sum of all share balances. Must equal the pool's supply at all
    /// times — the conservation invariant the engine asserts in tests.
    pub fn total_share_balance(&self) -> u128 {
        self.accounts
            .values()
            .fold(0u128, |acc, a| acc.saturating_add(a.share_balance))
    }

    /// Number of accounts ever created (including zero-share accounts).
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no account was ever created.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterates over `(principal, account)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PrincipalAccount)> {
        self.accounts.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
