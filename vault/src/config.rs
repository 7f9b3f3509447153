//! # Vault Configuration & Constants
//!
//! Every magic number in the vault lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! Amounts are `u128` in the asset's smallest unit. The defaults below
//! mirror the parameters the vault launched with; deployments override
//! them through [`VaultConfig`](crate::ledger::engine::VaultConfig).

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Ledger format version, stamped into persisted snapshots. Bump on any
/// breaking change to the snapshot layout and write a migration, or
/// enjoy explaining to depositors where their shares went.
pub const LEDGER_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Units & Ratios
// ---------------------------------------------------------------------------

/// One whole asset unit in smallest-unit denomination. The underlying
/// asset carries 18 decimals, so this is 10^18. The ledger never divides
/// by this — it exists for configuration defaults and display.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator. 10_000 bps = 100%. The one constant in
/// finance everyone agrees on.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Default target reserve ratio: 10% of total assets held liquid in the
/// vault, the rest deployed to the yield strategy. High enough that
/// ordinary withdrawals never touch the strategy, low enough that most
/// capital is actually working.
pub const DEFAULT_RESERVE_RATIO_BPS: u32 = 1_000;

/// Upper bound on a configurable reserve ratio. A vault holding more
/// than half its assets idle is a savings account with extra steps.
pub const MAX_RESERVE_RATIO_BPS: u32 = 5_000;

/// Rebalance hysteresis factor. The reserve may drift up to this
/// multiple of the target before a rebalance pushes the excess into the
/// strategy. A soft band, not a point target — rebalancing on every
/// minor fluctuation just burns gas moving the same coins back and forth.
pub const RESERVE_UPPER_BAND_FACTOR: u128 = 2;

// ---------------------------------------------------------------------------
// Deposit Limits
// ---------------------------------------------------------------------------

/// Minimum accepted deposit: 10 whole units. Filters out dust deposits
/// that cost more to account for than they're worth.
pub const MIN_DEPOSIT: u128 = 10 * UNIT;

/// Default per-principal deposit ceiling: 1,000,000 whole units.
pub const DEFAULT_MAX_PER_PRINCIPAL: u128 = 1_000_000 * UNIT;

/// Default ceiling on vault-wide total assets: 10,000,000 whole units.
/// The TVL cap — raised by governance as strategy capacity grows.
pub const DEFAULT_MAX_TOTAL_ASSETS: u128 = 10_000_000 * UNIT;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Capacity of the in-memory event ring. Older events are evicted from
/// memory but survive in the persistent journal.
pub const EVENT_LOG_CAPACITY: usize = 1_024;

// ---------------------------------------------------------------------------
// Yield Simulation
// ---------------------------------------------------------------------------

/// Default simulated yield for the reference strategy, in basis points
/// per year. 3.5% APY, matching the lending market the original strategy
/// targeted.
pub const DEFAULT_YIELD_BPS_PER_YEAR: u32 = 350;

/// Seconds per year used by the accrual math. 365 days, no leap-year
/// pedantry.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Computes `amount * ratio_bps / 10_000` without intermediate overflow
/// for any amount the deposit ceilings admit. Used for target-reserve
/// math where the ratio is a validated config value.
pub fn apply_bps(amount: u128, ratio_bps: u32) -> u128 {
    // ratio_bps <= 10_000, so the product fits u128 for any amount below
    // u128::MAX / 10_000 — far above MAX_TOTAL_ASSETS territory.
    amount.saturating_mul(ratio_bps as u128) / BPS_DENOMINATOR
}

/// Returns true when a reserve ratio is inside the configurable range.
/// Zero is allowed (fully deployed vault); above 50% is not.
pub fn reserve_ratio_is_valid(ratio_bps: u32) -> bool {
    ratio_bps <= MAX_RESERVE_RATIO_BPS
}
