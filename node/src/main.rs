// Copyright (c) 2026 Attestify Labs. MIT License.
// See LICENSE for details.

//! # Attestify Vault Daemon
//!
//! Entry point for the `attestify-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the ledger from disk, and
//! serves the REST API alongside the yield accrual loop.
//!
//! The binary supports four subcommands:
//!
//! - `run`     — start the vault daemon
//! - `init`    — initialize a data directory with an empty ledger
//! - `status`  — query a running daemon's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::signal;

use attestify_vault::config::LEDGER_VERSION;
use attestify_vault::external::{AllowlistVerifier, InMemoryAsset, SimStrategy};
use attestify_vault::ledger::{Vault, VaultConfig};
use attestify_vault::storage::VaultDb;

use cli::{AttestifyCli, Commands};
use logging::LogFormat;
use metrics::VaultMetrics;

/// Holder id the vault uses on the asset ledger.
const VAULT_HOLDER: &str = "vault";
/// Holder id where the strategy keeps deployed capital.
const STRATEGY_HOLDER: &str = "vault-strategy";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AttestifyCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full daemon: ledger restore, API server, metrics endpoint,
/// and the yield accrual loop.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        &logging::default_directives(),
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting attestify-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = Arc::new(
        VaultDb::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Asset ledger ---
    let asset = Arc::new(InMemoryAsset::new("AUSD"));
    let holdings = db.load_holdings().context("failed to load holdings")?;
    for (holder, amount) in &holdings {
        asset
            .mint(holder, *amount)
            .with_context(|| format!("failed to restore holding for {holder}"))?;
    }
    if !holdings.is_empty() {
        tracing::info!(holders = holdings.len(), "asset holdings restored");
    }

    // --- Collaborators ---
    let strategy = Arc::new(SimStrategy::new(
        Arc::clone(&asset),
        VAULT_HOLDER,
        STRATEGY_HOLDER,
    ));
    let verifier = Arc::new(AllowlistVerifier::new());
    for principal in &args.allow {
        verifier.allow(principal);
    }
    if !args.allow.is_empty() {
        tracing::info!(count = args.allow.len(), "principals pre-verified");
    }

    // --- Vault ledger ---
    let snapshot = db.load_snapshot().context("failed to load snapshot")?;
    let vault = match snapshot {
        Some(snapshot) => {
            tracing::info!(
                total_shares = %snapshot.total_shares,
                accounts = snapshot.accounts.len(),
                paused = snapshot.paused,
                "ledger restored from snapshot"
            );
            Vault::restore(
                snapshot,
                asset.clone(),
                strategy.clone(),
                verifier.clone(),
                VAULT_HOLDER,
            )
            .map_err(|e| anyhow::anyhow!("failed to restore ledger: {e}"))?
        }
        None => {
            let config = VaultConfig {
                owner: args.owner.clone(),
                reserve_ratio_bps: args.reserve_ratio_bps,
                min_deposit: args.min_deposit,
                ..VaultConfig::default()
            };
            tracing::info!(
                owner = %config.owner,
                reserve_ratio_bps = config.reserve_ratio_bps,
                "fresh ledger created"
            );
            Vault::new(
                config,
                asset.clone(),
                strategy.clone(),
                verifier.clone(),
                VAULT_HOLDER,
            )
            .map_err(|e| anyhow::anyhow!("invalid vault configuration: {e}"))?
        }
    };
    let vault = Arc::new(vault);

    // --- Metrics ---
    let vault_metrics = Arc::new(VaultMetrics::new());
    vault_metrics.refresh_from(&vault);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!("{} (ledger v{})", env!("CARGO_PKG_VERSION"), LEDGER_VERSION),
        network: "devnet".to_string(),
        vault: Arc::clone(&vault),
        db: Arc::clone(&db),
        asset: Arc::clone(&asset),
        verifier,
        metrics: Arc::clone(&vault_metrics),
        persisted_seq: Arc::new(AtomicU64::new(vault.next_event_seq())),
    };

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&vault_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Yield accrual loop ---
    // The simulated strategy earns a fixed rate; each tick mints the
    // interest for the elapsed interval onto the deployed position and
    // persists the holdings so a restart does not lose accrued value.
    let accrual_vault = Arc::clone(&vault);
    let accrual_strategy = Arc::clone(&strategy);
    let accrual_asset = Arc::clone(&asset);
    let accrual_db = Arc::clone(&db);
    let accrual_metrics = Arc::clone(&vault_metrics);
    let yield_bps = args.yield_bps;
    let interval_secs = args.accrual_interval_secs.max(1);
    let accrual_loop = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        // The first tick fires immediately; skip it so no interval is
        // double-counted.
        interval.tick().await;
        loop {
            interval.tick().await;
            match accrual_strategy.accrue_yield(yield_bps, interval_secs) {
                Ok(0) => {}
                Ok(interest) => {
                    if let Err(e) = accrual_db.save_holdings(&accrual_asset.all_holdings()) {
                        tracing::error!("failed to persist accrued holdings: {}", e);
                    }
                    accrual_metrics.refresh_from(&accrual_vault);
                    tracing::debug!(interest, "yield accrued");
                }
                Err(e) => tracing::warn!("yield accrual failed: {}", e),
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    accrual_loop.abort();

    // Final persist so accrued yield and any in-flight ledger state hit
    // disk before exit.
    db.save_snapshot(&vault.snapshot())
        .context("failed to write final snapshot")?;
    db.save_holdings(&asset.all_holdings())
        .context("failed to write final holdings")?;
    db.flush().context("failed to flush database")?;
    tracing::info!("attestify-node stopped");
    Ok(())
}

/// Initializes a new data directory with an empty vault ledger.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(&logging::default_directives(), LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), owner = %args.owner, "initializing vault");

    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = VaultDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    if db.load_snapshot()?.is_some() {
        anyhow::bail!(
            "data directory {} already holds a vault ledger",
            data_dir.display()
        );
    }

    // Build an empty ledger just to capture its initial snapshot.
    let config = VaultConfig {
        owner: args.owner.clone(),
        reserve_ratio_bps: args.reserve_ratio_bps,
        ..VaultConfig::default()
    };
    let asset = Arc::new(InMemoryAsset::new("AUSD"));
    let strategy = Arc::new(SimStrategy::new(
        Arc::clone(&asset),
        VAULT_HOLDER,
        STRATEGY_HOLDER,
    ));
    let vault = Vault::new(
        config,
        asset,
        strategy,
        Arc::new(AllowlistVerifier::new()),
        VAULT_HOLDER,
    )
    .map_err(|e| anyhow::anyhow!("invalid vault configuration: {e}"))?;

    db.save_snapshot(&vault.snapshot())
        .context("failed to write initial snapshot")?;
    db.flush().context("failed to flush database")?;

    println!("Vault initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Owner          : {}", args.owner);
    println!("  Reserve ratio  : {} bps", args.reserve_ratio_bps);
    println!("  Ledger version : {}", LEDGER_VERSION);

    Ok(())
}

/// Queries a running daemon's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.api_url.trim_end_matches('/'));
    let body: String = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP GET without pulling in `reqwest` as a dependency.
/// In a real deployment, swap this for a proper HTTP client.
async fn http_get(url: &str) -> Result<String> {
    // Use tokio's TCP stream + raw HTTP/1.1 to avoid adding reqwest.
    let parsed: url::Url = url
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid URL: {}", e))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("missing host in URL"))?;
    let port = parsed.port().unwrap_or(80);
    let path = parsed.path();

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Strip HTTP headers — everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("attestify-node {}", env!("CARGO_PKG_VERSION"));
    println!("ledger         v{}", LEDGER_VERSION);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Minimal URL parser — just enough to extract host/port/path.
/// Avoids pulling in the `url` crate for a single use.
mod url {
    pub struct Url {
        host: String,
        port: Option<u16>,
        path: String,
    }

    impl Url {
        pub fn host_str(&self) -> Option<&str> {
            Some(&self.host)
        }

        pub fn port(&self) -> Option<u16> {
            self.port
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl std::str::FromStr for Url {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            // Strip scheme.
            let rest = s
                .strip_prefix("http://")
                .or_else(|| s.strip_prefix("https://"))
                .unwrap_or(s);

            let (authority, path) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, "/"),
            };

            let (host, port) = match authority.rfind(':') {
                Some(i) => {
                    let p = authority[i + 1..]
                        .parse::<u16>()
                        .map_err(|e| format!("bad port: {}", e))?;
                    (authority[..i].to_string(), Some(p))
                }
                None => (authority.to_string(), None),
            };

            Ok(Url {
                host,
                port,
                path: path.to_string(),
            })
        }
    }
}
