//! # Prometheus Metrics
//!
//! Exposes operational metrics for the vault daemon. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers. Ledger amounts
//! are `u128` internally; the gauges clamp to `i64::MAX` at export, which is
//! lossy only past ~9.2e18 smallest units.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use attestify_vault::ledger::Vault;

/// Holds all Prometheus metric handles for the daemon.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct VaultMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total assets under management: reserve plus deployed capital.
    pub total_assets: IntGauge,
    /// Outstanding share supply.
    pub total_shares: IntGauge,
    /// Assets held directly by the vault (immediately liquid).
    pub reserve_balance: IntGauge,
    /// Assets deployed into the yield strategy.
    pub strategy_balance: IntGauge,
    /// 1 while the vault is paused, 0 otherwise.
    pub paused: IntGauge,
    /// Number of principal accounts ever created.
    pub principal_accounts: IntGauge,
    /// Total number of successful deposits.
    pub deposits_total: IntCounter,
    /// Total number of successful withdrawals (including full exits).
    pub withdrawals_total: IntCounter,
    /// Total number of rebalance calls that completed.
    pub rebalances_total: IntCounter,
    /// Total number of operations rejected with a vault error.
    pub operations_rejected_total: IntCounter,
    /// Total number of failed post-operation persistence writes. Non-zero
    /// means committed ledger state exists that has not reached disk —
    /// alert on any increase.
    pub persistence_failures_total: IntCounter,
    /// Histogram of ledger operation latency in seconds.
    pub operation_latency_seconds: Histogram,
}

impl VaultMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("attestify".into()), None)
            .expect("failed to create prometheus registry");

        let total_assets = IntGauge::new(
            "total_assets",
            "Total assets under management in smallest units",
        )
        .expect("metric creation");
        registry
            .register(Box::new(total_assets.clone()))
            .expect("metric registration");

        let total_shares = IntGauge::new("total_shares", "Outstanding share supply")
            .expect("metric creation");
        registry
            .register(Box::new(total_shares.clone()))
            .expect("metric registration");

        let reserve_balance = IntGauge::new(
            "reserve_balance",
            "Liquid reserve held directly by the vault",
        )
        .expect("metric creation");
        registry
            .register(Box::new(reserve_balance.clone()))
            .expect("metric registration");

        let strategy_balance = IntGauge::new(
            "strategy_balance",
            "Assets deployed into the yield strategy",
        )
        .expect("metric creation");
        registry
            .register(Box::new(strategy_balance.clone()))
            .expect("metric registration");

        let paused = IntGauge::new("paused", "1 while the vault is paused, 0 otherwise")
            .expect("metric creation");
        registry
            .register(Box::new(paused.clone()))
            .expect("metric registration");

        let principal_accounts =
            IntGauge::new("principal_accounts", "Number of principal accounts")
                .expect("metric creation");
        registry
            .register(Box::new(principal_accounts.clone()))
            .expect("metric registration");

        let deposits_total =
            IntCounter::new("deposits_total", "Total number of successful deposits")
                .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total = IntCounter::new(
            "withdrawals_total",
            "Total number of successful withdrawals",
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let rebalances_total =
            IntCounter::new("rebalances_total", "Total number of completed rebalances")
                .expect("metric creation");
        registry
            .register(Box::new(rebalances_total.clone()))
            .expect("metric registration");

        let operations_rejected_total = IntCounter::new(
            "operations_rejected_total",
            "Total number of operations rejected with a vault error",
        )
        .expect("metric creation");
        registry
            .register(Box::new(operations_rejected_total.clone()))
            .expect("metric registration");

        let persistence_failures_total = IntCounter::new(
            "persistence_failures_total",
            "Total number of failed post-operation persistence writes",
        )
        .expect("metric creation");
        registry
            .register(Box::new(persistence_failures_total.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "End-to-end ledger operation latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            total_assets,
            total_shares,
            reserve_balance,
            strategy_balance,
            paused,
            principal_accounts,
            deposits_total,
            withdrawals_total,
            rebalances_total,
            operations_rejected_total,
            persistence_failures_total,
            operation_latency_seconds,
        }
    }

    /// Re-reads the ledger gauges from the vault. Called after every
    /// mutating operation and on each accrual tick.
    pub fn refresh_from(&self, vault: &Vault) {
        self.total_assets.set(clamp_i64(vault.total_assets()));
        self.total_shares.set(clamp_i64(vault.total_shares()));
        self.reserve_balance.set(clamp_i64(vault.reserve_balance()));
        self.strategy_balance
            .set(clamp_i64(vault.strategy_balance()));
        self.paused.set(i64::from(vault.is_paused()));
        self.principal_accounts.set(vault.account_count() as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for VaultMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_i64(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<VaultMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
