use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use super::models::*;
use crate::{
    bridge::client::BridgeClient,
    chain::{Asset, TreasuryGateway},
    error::{AppError, AppResult},
    payout::{PayoutClient, PayoutProcessor},
    settlement::{ReservationLedger, SettlementOrchestrator, SettlementRequest, SettlementStore},
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SettlementOrchestrator>,
    pub bridge: Arc<BridgeClient>,
    pub payout: Arc<PayoutClient>,
    pub treasury: Arc<dyn TreasuryGateway>,
    pub reservations: Arc<ReservationLedger>,
    pub store: Arc<SettlementStore>,
    /// Flipped to true on shutdown; in-flight settlements observe it and
    /// stop polling
    pub shutdown: watch::Receiver<bool>,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Run a swap through the full settlement workflow. Field-level checks
/// run in the `validate_json` route middleware before this handler.
/// POST /api/v1/settlements
pub async fn complete_settlement(
    State(state): State<AppState>,
    Json(request): Json<CompleteSettlementRequest>,
) -> AppResult<Json<SettlementResponse>> {
    let domain: SettlementRequest = request.try_into()?;
    info!(
        "Settlement requested for swap {} ({} -> {})",
        domain.swap_id, domain.asset, domain.fiat_currency
    );

    let receipt = state
        .orchestrator
        .settle(domain, state.shutdown.clone())
        .await?;

    Ok(Json(SettlementResponse::from(receipt)))
}

/// Settlement attempt status and transition history
/// GET /api/v1/settlements/:id
pub async fn get_settlement_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SettlementStatusResponse>> {
    let record = state
        .store
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("settlement attempt {}", id)))?;

    Ok(Json(SettlementStatusResponse::from(record)))
}

/// Treasury balance for one asset, net of in-flight claims and transfers
/// submitted but not yet reflected on-chain
/// GET /api/v1/treasury/balance/:asset
pub async fn get_treasury_balance(
    State(state): State<AppState>,
    Path(asset): Path<String>,
) -> AppResult<Json<TreasuryBalanceResponse>> {
    let asset: Asset = asset.parse()?;
    let balance = state.treasury.balance_of(asset).await?;
    let reserved =
        state.reservations.outstanding(asset) + state.reservations.pending_outbound(asset);

    Ok(Json(TreasuryBalanceResponse::new(
        asset,
        state.treasury.address(),
        balance,
        reserved,
    )))
}

/// Create a swap with the bridge provider (client funding flow). The body
/// is the provider's own schema, passed through untouched.
/// POST /api/v1/bridge/swaps
pub async fn create_swap(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let swap = state.bridge.create_swap(body).await?;
    Ok(Json(swap))
}

/// Full swap payload for the client-facing status view
/// GET /api/v1/bridge/swaps/:id
pub async fn get_swap(
    State(state): State<AppState>,
    Path(swap_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let swap = state.bridge.get_swap(&swap_id).await?;
    Ok(Json(swap))
}

/// Supported payout currencies
/// GET /api/v1/payout/currencies
pub async fn get_currencies(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let currencies = state.payout.get_currencies().await?;
    Ok(Json(currencies))
}

/// Receiving institutions for a payout currency
/// GET /api/v1/payout/institutions/:currency
pub async fn get_institutions(
    State(state): State<AppState>,
    Path(currency): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let institutions = state.payout.get_institutions(&currency).await?;
    Ok(Json(institutions))
}

/// Verify a bank account holder with the payout processor
/// POST /api/v1/payout/verify-account
pub async fn verify_account(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let result = state.payout.verify_account(body).await?;
    Ok(Json(result))
}

/// Indicative fiat conversion rate
/// GET /api/v1/payout/rates/:token/:amount/:currency
pub async fn get_rate(
    State(state): State<AppState>,
    Path((token, amount, currency)): Path<(String, Decimal, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let asset: Asset = token.parse()?;
    let rate = state
        .payout
        .fetch_rate(asset, amount, &currency.to_uppercase())
        .await?;

    Ok(Json(serde_json::json!({
        "token": asset.symbol(),
        "amount": amount,
        "currency": currency.to_uppercase(),
        "rate": rate,
    })))
}
