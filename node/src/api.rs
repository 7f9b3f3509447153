//! # REST API
//!
//! Builds the axum router that exposes the vault daemon's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                    | Description                        |
//! |--------|-------------------------|------------------------------------|
//! | GET    | `/health`               | Liveness probe                     |
//! | GET    | `/status`               | Vault status summary               |
//! | GET    | `/accounts/:principal`  | Principal account state            |
//! | GET    | `/events`               | Event journal (`?since=N`)         |
//! | POST   | `/vault/deposit`        | Deposit assets, mint shares        |
//! | POST   | `/vault/withdraw`       | Withdraw an asset amount           |
//! | POST   | `/vault/withdraw-all`   | Exit the full position             |
//! | POST   | `/vault/rebalance`      | Restore the target reserve         |
//! | POST   | `/admin/pause`          | Pause deposits and rebalancing     |
//! | POST   | `/admin/unpause`        | Resume normal operation            |
//! | POST   | `/admin/limits`         | Update deposit ceilings            |
//! | POST   | `/admin/rebalancer`     | Delegate or revoke the rebalancer  |
//! | POST   | `/admin/verify`         | Allow or revoke a principal        |
//! | POST   | `/faucet`               | Mint devnet funds to a principal   |
//!
//! Every mutating endpoint persists a fresh snapshot, the new journal
//! entries, and the devnet holdings before returning. A failed write does
//! not fail the request — the ledger mutation already committed — but it
//! bumps `persistence_failures_total` and logs at error level, since a
//! crash before the next successful write would lose the committed state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use attestify_vault::external::{AllowlistVerifier, InMemoryAsset};
use attestify_vault::ledger::{Vault, VaultError, VaultLimits};
use attestify_vault::storage::VaultDb;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The daemon's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet", "testnet", "mainnet").
    pub network: String,
    /// The vault ledger engine.
    pub vault: Arc<Vault>,
    /// Persistent storage for snapshots, the journal, and holdings.
    pub db: Arc<VaultDb>,
    /// The devnet asset ledger, for the faucet and holdings persistence.
    pub asset: Arc<InMemoryAsset>,
    /// Deposit-permission allowlist, mutated through `/admin/verify`.
    pub verifier: Arc<AllowlistVerifier>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Sequence number up to which the journal has been persisted.
    pub persisted_seq: Arc<AtomicU64>,
}

impl AppState {
    /// Writes the current ledger state to disk: snapshot, any journal
    /// entries past the persisted watermark, and the devnet holdings.
    ///
    /// Failures degrade durability, not correctness, so they are counted
    /// and logged rather than failing the already-committed operation.
    fn persist(&self) {
        if let Err(e) = self.db.save_snapshot(&self.vault.snapshot()) {
            self.metrics.persistence_failures_total.inc();
            tracing::error!("failed to persist snapshot: {}", e);
            return;
        }
        let from = self.persisted_seq.load(Ordering::Acquire);
        let events = self.vault.events_since(from);
        if !events.is_empty() {
            if let Err(e) = self.db.append_events(&events) {
                self.metrics.persistence_failures_total.inc();
                tracing::error!("failed to persist events: {}", e);
                return;
            }
        }
        self.persisted_seq
            .store(self.vault.next_event_seq(), Ordering::Release);

        if let Err(e) = self.db.save_holdings(&self.asset.all_holdings()) {
            self.metrics.persistence_failures_total.inc();
            tracing::error!("failed to persist holdings: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured API port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/accounts/:principal", get(account_handler))
        .route("/events", get(events_handler))
        .route("/vault/deposit", post(deposit_handler))
        .route("/vault/withdraw", post(withdraw_handler))
        .route("/vault/withdraw-all", post(withdraw_all_handler))
        .route("/vault/rebalance", post(rebalance_handler))
        .route("/admin/pause", post(pause_handler))
        .route("/admin/unpause", post(unpause_handler))
        .route("/admin/limits", post(limits_handler))
        .route("/admin/rebalancer", post(rebalancer_handler))
        .route("/admin/verify", post(verify_handler))
        .route("/faucet", post(faucet_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Daemon software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// Whether the vault is paused.
    pub paused: bool,
    /// Total assets under management in smallest units.
    pub total_assets: u128,
    /// Outstanding share supply.
    pub total_shares: u128,
    /// Liquid reserve held directly by the vault.
    pub reserve_balance: u128,
    /// Assets deployed into the yield strategy.
    pub strategy_balance: u128,
    /// Target reserve ratio in basis points.
    pub reserve_ratio_bps: u32,
    /// Minimum deposit.
    pub min_deposit: u128,
    /// Current deposit ceilings.
    pub limits: VaultLimits,
    /// Number of principal accounts.
    pub account_count: usize,
    /// The vault owner principal.
    pub owner: String,
    /// The delegated rebalancer, if any.
    pub rebalancer: Option<String>,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /accounts/:principal`.
///
/// Unknown principals get a zeroed record rather than a 404 — "you hold
/// nothing" is a valid answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    /// The principal id.
    pub principal: String,
    /// Share balance.
    pub shares: u128,
    /// Asset value of the shares at the current price.
    pub balance: u128,
    /// Lifetime assets deposited.
    pub cumulative_deposited: u128,
    /// Lifetime assets withdrawn.
    pub cumulative_withdrawn: u128,
    /// Lifetime earnings; negative if the strategy lost money.
    pub earnings: i128,
}

/// Query parameters for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events with sequence number >= this. Defaults to 0.
    #[serde(default)]
    pub since: u64,
}

/// Request body for `POST /vault/deposit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub principal: String,
    pub amount: u128,
}

/// Request body for `POST /vault/withdraw`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub principal: String,
    pub assets: u128,
    /// Slippage floor on the payout. Defaults to 0 (no floor).
    #[serde(default)]
    pub min_assets_out: u128,
}

/// Request body for `POST /vault/withdraw-all`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawAllRequest {
    pub principal: String,
}

/// Request body for `POST /vault/rebalance` and the pause endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

/// Request body for `POST /admin/limits`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LimitsRequest {
    pub caller: String,
    pub max_per_principal: u128,
    pub max_total_assets: u128,
}

/// Request body for `POST /admin/rebalancer`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RebalancerRequest {
    pub caller: String,
    /// `null` clears the delegation.
    pub rebalancer: Option<String>,
}

/// Request body for `POST /admin/verify`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub principal: String,
    /// `true` allows the principal to deposit, `false` revokes.
    pub allowed: bool,
}

/// Request body for `POST /faucet`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub principal: String,
    pub amount: u128,
}

/// Acknowledgement body for admin endpoints without a richer receipt.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    pub paused: bool,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Maps a [`VaultError`] to an HTTP status.
///
/// Authorization failures are 403, malformed or out-of-bounds requests
/// are 400, and state conflicts (paused, slippage, liquidity) are 409.
/// Collaborator failures the caller cannot fix are 500.
fn error_status(err: &VaultError) -> StatusCode {
    if err.is_authorization() {
        StatusCode::FORBIDDEN
    } else if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_safety_check() {
        StatusCode::CONFLICT
    } else {
        match err {
            VaultError::Paused | VaultError::NotPaused => StatusCode::CONFLICT,
            // The depositor not having the funds is their problem.
            VaultError::Asset(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders a vault error as an HTTP response and bumps the rejection
/// counter.
fn reject(state: &AppState, err: VaultError) -> axum::response::Response {
    state.metrics.operations_rejected_total.inc();
    let status = error_status(&err);
    tracing::debug!(%err, status = %status, "operation rejected");
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the daemon is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.).
/// It intentionally does not check internal subsystem health — that
/// belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns the vault status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let vault = &state.vault;
    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        paused: vault.is_paused(),
        total_assets: vault.total_assets(),
        total_shares: vault.total_shares(),
        reserve_balance: vault.reserve_balance(),
        strategy_balance: vault.strategy_balance(),
        reserve_ratio_bps: vault.reserve_ratio_bps(),
        min_deposit: vault.min_deposit(),
        limits: vault.limits(),
        account_count: vault.account_count(),
        owner: vault.owner(),
        rebalancer: vault.rebalancer(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /accounts/:principal` — returns account state for the principal.
async fn account_handler(
    Path(principal): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let vault = &state.vault;
    let (deposited, withdrawn) = match vault.account(&principal) {
        Some(account) => (account.cumulative_deposited, account.cumulative_withdrawn),
        None => (0, 0),
    };

    let resp = AccountResponse {
        shares: vault.shares_of(&principal),
        balance: vault.balance_of(&principal),
        earnings: vault.earnings_of(&principal),
        cumulative_deposited: deposited,
        cumulative_withdrawn: withdrawn,
        principal,
    };
    Json(resp)
}

/// `GET /events?since=N` — returns journaled events in sequence order.
///
/// Reads from the persistent journal, not the in-memory ring, so history
/// is complete even past the ring's capacity.
async fn events_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.db.events_since(query.since) {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => {
            tracing::error!("failed to read event journal: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("journal read failed: {e}"),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Vault Operation Handlers
// ---------------------------------------------------------------------------

/// `POST /vault/deposit` — deposits assets and mints shares.
async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> impl IntoResponse {
    let timer = state.metrics.operation_latency_seconds.start_timer();
    let result = state.vault.deposit(&req.principal, req.amount);
    timer.observe_duration();

    match result {
        Ok(receipt) => {
            state.metrics.deposits_total.inc();
            state.metrics.refresh_from(&state.vault);
            state.persist();
            tracing::info!(
                principal = %receipt.principal,
                assets = receipt.assets,
                shares = receipt.shares,
                "deposit accepted"
            );
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /vault/withdraw` — withdraws an asset-denominated amount.
async fn withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> impl IntoResponse {
    let timer = state.metrics.operation_latency_seconds.start_timer();
    let result = state
        .vault
        .withdraw(&req.principal, req.assets, req.min_assets_out);
    timer.observe_duration();

    match result {
        Ok(receipt) => {
            state.metrics.withdrawals_total.inc();
            state.metrics.refresh_from(&state.vault);
            state.persist();
            tracing::info!(
                principal = %receipt.principal,
                assets = receipt.assets,
                shares = receipt.shares,
                "withdrawal paid"
            );
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /vault/withdraw-all` — exits the principal's full position.
async fn withdraw_all_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawAllRequest>,
) -> impl IntoResponse {
    let timer = state.metrics.operation_latency_seconds.start_timer();
    let result = state.vault.withdraw_all(&req.principal);
    timer.observe_duration();

    match result {
        Ok(receipt) => {
            state.metrics.withdrawals_total.inc();
            state.metrics.refresh_from(&state.vault);
            state.persist();
            tracing::info!(
                principal = %receipt.principal,
                assets = receipt.assets,
                "full exit paid"
            );
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /vault/rebalance` — restores the target reserve ratio.
async fn rebalance_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> impl IntoResponse {
    let timer = state.metrics.operation_latency_seconds.start_timer();
    let result = state.vault.rebalance(&req.caller);
    timer.observe_duration();

    match result {
        Ok(report) => {
            state.metrics.rebalances_total.inc();
            state.metrics.refresh_from(&state.vault);
            state.persist();
            tracing::info!(
                pulled = report.pulled,
                pushed = report.pushed,
                reserve_after = report.reserve_after,
                "rebalance completed"
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

// ---------------------------------------------------------------------------
// Admin Handlers
// ---------------------------------------------------------------------------

/// `POST /admin/pause` — halts deposits, rebalancing, and limit changes.
async fn pause_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> impl IntoResponse {
    match state.vault.pause(&req.caller) {
        Ok(()) => {
            state.metrics.refresh_from(&state.vault);
            state.persist();
            tracing::warn!(by = %req.caller, "vault paused");
            ack(&state).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /admin/unpause` — resumes normal operation.
async fn unpause_handler(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> impl IntoResponse {
    match state.vault.unpause(&req.caller) {
        Ok(()) => {
            state.metrics.refresh_from(&state.vault);
            state.persist();
            tracing::info!(by = %req.caller, "vault unpaused");
            ack(&state).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /admin/limits` — updates the deposit ceilings.
async fn limits_handler(
    State(state): State<AppState>,
    Json(req): Json<LimitsRequest>,
) -> impl IntoResponse {
    match state
        .vault
        .set_limits(&req.caller, req.max_per_principal, req.max_total_assets)
    {
        Ok(()) => {
            state.persist();
            tracing::info!(
                max_per_principal = req.max_per_principal,
                max_total_assets = req.max_total_assets,
                "deposit limits updated"
            );
            (StatusCode::OK, Json(state.vault.limits())).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /admin/rebalancer` — delegates or revokes the rebalancer role.
async fn rebalancer_handler(
    State(state): State<AppState>,
    Json(req): Json<RebalancerRequest>,
) -> impl IntoResponse {
    match state.vault.set_rebalancer(&req.caller, req.rebalancer) {
        Ok(()) => {
            state.persist();
            tracing::info!(rebalancer = ?state.vault.rebalancer(), "rebalancer updated");
            ack(&state).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /admin/verify` — allows or revokes a principal on the deposit
/// allowlist.
///
/// Revocation blocks future deposits only; shares already held remain
/// withdrawable.
async fn verify_handler(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> impl IntoResponse {
    if req.allowed {
        state.verifier.allow(&req.principal);
    } else {
        state.verifier.revoke(&req.principal);
    }
    tracing::info!(principal = %req.principal, allowed = req.allowed, "allowlist updated");
    ack(&state)
}

/// `POST /faucet` — mints devnet funds to a principal's wallet.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> impl IntoResponse {
    if req.amount == 0 {
        return reject(&state, VaultError::InvalidAmount { amount: 0 });
    }
    match state.asset.mint(&req.principal, req.amount) {
        Ok(balance) => {
            state.persist();
            tracing::info!(principal = %req.principal, amount = req.amount, "faucet mint");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "principal": req.principal,
                    "balance": balance.to_string(),
                })),
            )
                .into_response()
        }
        Err(err) => reject(&state, VaultError::Asset(err)),
    }
}

fn ack(state: &AppState) -> (StatusCode, Json<AckResponse>) {
    (
        StatusCode::OK,
        Json(AckResponse {
            ok: true,
            paused: state.vault.is_paused(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use attestify_vault::external::SimStrategy;
    use attestify_vault::ledger::{DepositReceipt, SequencedEvent, VaultConfig, WithdrawReceipt};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Creates a test AppState backed by a temporary database, with alice
    /// and bob funded and verified.
    fn test_app_state() -> AppState {
        let db = Arc::new(VaultDb::open_temporary().expect("temp db"));
        let asset = Arc::new(InMemoryAsset::new("AUSD"));
        let strategy = Arc::new(SimStrategy::new(Arc::clone(&asset), "vault", "vault-strategy"));
        let verifier = Arc::new(AllowlistVerifier::new());
        for principal in ["alice", "bob"] {
            asset.mint(principal, 100_000).expect("mint");
            verifier.allow(principal);
        }

        let config = VaultConfig {
            owner: "owner".to_string(),
            reserve_ratio_bps: 1_000,
            min_deposit: 10,
            max_per_principal: 1_000_000,
            max_total_assets: 10_000_000,
        };
        let vault = Arc::new(
            Vault::new(
                config,
                asset.clone(),
                strategy,
                verifier.clone(),
                "vault",
            )
            .expect("valid config"),
        );

        AppState {
            version: "0.1.0-test".into(),
            network: "devnet".into(),
            vault,
            db,
            asset,
            verifier,
            metrics: Arc::new(crate::metrics::VaultMetrics::new()),
            persisted_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    // -- 1. Health endpoint --------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let state = test_app_state();
        let router = create_router(state);
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    // -- 2. Deposit then status reflects the ledger --------------------------

    #[tokio::test]
    async fn deposit_and_status_round_trip() {
        let state = test_app_state();
        let router = create_router(state);

        let (status, body) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: DepositReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(receipt.shares, 1_000);

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.total_assets, 1_000);
        assert_eq!(resp.total_shares, 1_000);
        assert_eq!(resp.reserve_balance, 100);
        assert_eq!(resp.strategy_balance, 900);
        assert_eq!(resp.account_count, 1);
        assert!(!resp.paused);
    }

    // -- 3. Deposit persists a snapshot --------------------------------------

    #[tokio::test]
    async fn deposit_persists_snapshot_and_journal() {
        let state = test_app_state();
        let db = Arc::clone(&state.db);
        let router = create_router(state);

        post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;

        let snapshot = db.load_snapshot().unwrap().expect("snapshot written");
        assert_eq!(snapshot.total_shares, 1_000);
        assert_eq!(snapshot.accounts["alice"].share_balance, 1_000);
        assert_eq!(db.events_since(0).unwrap().len(), 1);
        assert!(!db.load_holdings().unwrap().is_empty());
    }

    // -- 4. Unverified depositor is forbidden --------------------------------

    #[tokio::test]
    async fn unverified_deposit_returns_403() {
        let state = test_app_state();
        let router = create_router(state);

        let (status, body) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "mallory", "amount": 1000 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("not verified"));
    }

    // -- 5. Validation failures are 400 ---------------------------------------

    #[tokio::test]
    async fn below_minimum_deposit_returns_400() {
        let state = test_app_state();
        let router = create_router(state);

        let (status, body) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("minimum"));
    }

    // -- 6. Withdraw endpoint pays out -----------------------------------------

    #[tokio::test]
    async fn withdraw_endpoint_pays_out() {
        let state = test_app_state();
        let router = create_router(state);

        post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;

        let (status, body) = post_json(
            &router,
            "/vault/withdraw",
            serde_json::json!({ "principal": "alice", "assets": 200 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: WithdrawReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(receipt.assets, 200);
        assert_eq!(receipt.share_balance, 800);
    }

    // -- 7. Slippage floor maps to 409 -----------------------------------------

    #[tokio::test]
    async fn slippage_failure_returns_409() {
        let state = test_app_state();
        let router = create_router(state);

        post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;

        let (status, _) = post_json(
            &router,
            "/vault/withdraw",
            serde_json::json!({ "principal": "alice", "assets": 200, "min_assets_out": 201 }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    // -- 8. Pause blocks deposits through the API ------------------------------

    #[tokio::test]
    async fn paused_vault_rejects_deposits_with_409() {
        let state = test_app_state();
        let router = create_router(state);

        let (status, _) = post_json(
            &router,
            "/admin/pause",
            serde_json::json!({ "caller": "owner" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = post_json(
            &router,
            "/admin/unpause",
            serde_json::json!({ "caller": "owner" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // -- 9. Admin endpoints reject non-owners -----------------------------------

    #[tokio::test]
    async fn admin_endpoints_reject_non_owner_with_403() {
        let state = test_app_state();
        let router = create_router(state);

        let (status, _) = post_json(
            &router,
            "/admin/pause",
            serde_json::json!({ "caller": "alice" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = post_json(
            &router,
            "/admin/limits",
            serde_json::json!({
                "caller": "alice",
                "max_per_principal": 100,
                "max_total_assets": 100
            }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    // -- 10. Account endpoint --------------------------------------------------

    #[tokio::test]
    async fn account_endpoint_returns_position() {
        let state = test_app_state();
        let router = create_router(state);

        post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;

        let (status, body) = get(&router, "/accounts/alice").await;
        assert_eq!(status, StatusCode::OK);
        let resp: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.shares, 1_000);
        assert_eq!(resp.balance, 1_000);
        assert_eq!(resp.cumulative_deposited, 1_000);
        assert_eq!(resp.earnings, 0);

        // Unknown principals read as an empty position.
        let (status, body) = get(&router, "/accounts/nobody").await;
        assert_eq!(status, StatusCode::OK);
        let resp: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.shares, 0);
        assert_eq!(resp.balance, 0);
    }

    // -- 11. Events endpoint serves the persisted journal ------------------------

    #[tokio::test]
    async fn events_endpoint_returns_journal_tail() {
        let state = test_app_state();
        let router = create_router(state);

        for amount in [1000, 2000, 3000] {
            post_json(
                &router,
                "/vault/deposit",
                serde_json::json!({ "principal": "alice", "amount": amount }),
            )
            .await;
        }

        let (status, body) = get(&router, "/events").await;
        assert_eq!(status, StatusCode::OK);
        let events: Vec<SequencedEvent> = serde_json::from_slice(&body).unwrap();
        assert_eq!(events.len(), 3);

        let (status, body) = get(&router, "/events?since=2").await;
        assert_eq!(status, StatusCode::OK);
        let events: Vec<SequencedEvent> = serde_json::from_slice(&body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 2);
    }

    // -- 12. Faucet and verify open the door for a new principal ----------------

    #[tokio::test]
    async fn faucet_and_verify_enable_a_new_principal() {
        let state = test_app_state();
        let router = create_router(state);

        let (status, _) = post_json(
            &router,
            "/faucet",
            serde_json::json!({ "principal": "carol", "amount": 5000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Funded but not yet verified.
        let (status, _) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "carol", "amount": 1000 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = post_json(
            &router,
            "/admin/verify",
            serde_json::json!({ "principal": "carol", "allowed": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "carol", "amount": 1000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // -- 13. Rebalancer delegation through the API -------------------------------

    #[tokio::test]
    async fn rebalancer_delegation_round_trip() {
        let state = test_app_state();
        let router = create_router(state);

        post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 1000 }),
        )
        .await;

        let (status, _) = post_json(
            &router,
            "/vault/rebalance",
            serde_json::json!({ "caller": "keeper" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = post_json(
            &router,
            "/admin/rebalancer",
            serde_json::json!({ "caller": "owner", "rebalancer": "keeper" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            &router,
            "/vault/rebalance",
            serde_json::json!({ "caller": "keeper" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // -- 14. Insufficient funds map to 400 ----------------------------------------

    #[tokio::test]
    async fn deposit_beyond_wallet_balance_returns_400() {
        let state = test_app_state();
        let router = create_router(state);

        let (status, body) = post_json(
            &router,
            "/vault/deposit",
            serde_json::json!({ "principal": "alice", "amount": 500_000 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("insufficient"));
    }
}
