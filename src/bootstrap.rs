use alloy::signers::local::PrivateKeySigner;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::info;

use crate::{
    api::handler::AppState,
    bridge::client::{BridgeClient, BridgeConfig},
    chain::{BaseTreasury, TreasuryConfig, TreasuryGateway},
    config::Config,
    error::{AppError, AppResult},
    payout::{PayoutClient, PayoutConfig},
    settlement::{OrchestratorConfig, ReservationLedger, SettlementOrchestrator, SettlementStore},
};

/// Wire every component from configuration. Returns the shared state and
/// the shutdown sender the server flips on ctrl-c.
pub async fn initialize_app_state(
    config: &Config,
) -> AppResult<(AppState, watch::Sender<bool>)> {
    info!("Initializing application components ...");

    // Treasury signer, server-held like the upstream API keys
    let signer: PrivateKeySigner = std::env::var("BASE_TREASURY_KEY")
        .map_err(|_| AppError::Config("BASE_TREASURY_KEY must be set".to_string()))?
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid BASE_TREASURY_KEY: {}", e)))?;

    let treasury: Arc<dyn TreasuryGateway> = Arc::new(BaseTreasury::new(
        &TreasuryConfig {
            rpc_url: config.base_rpc_url.clone(),
        },
        signer,
    )?);
    info!("✅ Treasury gateway initialized ({})", config.base_rpc_url);

    // One HTTP client shared by both upstream integrations
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let bridge = Arc::new(BridgeClient::new(
        http.clone(),
        BridgeConfig {
            base_url: config.bridge_api_url.clone(),
            api_key: config.bridge_api_key.clone(),
        },
    ));
    info!("✅ Bridge client initialized ({})", config.bridge_api_url);

    let payout = Arc::new(PayoutClient::new(
        http,
        PayoutConfig {
            base_url: config.payout_api_url.clone(),
            api_key: config.payout_api_key.clone(),
            network: config.payout_network.clone(),
        },
    ));
    info!("✅ Payout client initialized ({})", config.payout_api_url);

    let reservations = Arc::new(ReservationLedger::new());
    let store = Arc::new(SettlementStore::new());

    let orchestrator = Arc::new(SettlementOrchestrator::new(
        bridge.clone(),
        payout.clone(),
        treasury.clone(),
        reservations.clone(),
        store.clone(),
        OrchestratorConfig {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            poll_attempts: config.poll_max_attempts,
            network: config.payout_network.clone(),
        },
    ));
    info!(
        "✅ Settlement orchestrator initialized ({} checks x {}s)",
        config.poll_max_attempts, config.poll_interval_secs
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = AppState {
        orchestrator,
        bridge,
        payout,
        treasury,
        reservations,
        store,
        shutdown: shutdown_rx,
    };

    Ok((state, shutdown_tx))
}
