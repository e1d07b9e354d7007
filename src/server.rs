use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    api::{
        handler::{
            complete_settlement, create_swap, get_currencies, get_institutions, get_rate,
            get_settlement_status, get_swap, get_treasury_balance, health_check, verify_account,
            AppState,
        },
        models::CompleteSettlementRequest,
    },
    config::Config,
    middleware::{throttle_middleware, validate_json, RequestThrottle},
};

pub async fn create_app(state: AppState, config: &Config) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    // Settlements occupy a treasury poll slot for minutes, so admission is
    // throttled; everything else is bounded by the upstream providers.
    let throttle = RequestThrottle::new(config.rate_limit_requests, config.rate_limit_window_secs);

    let settlements = Router::new()
        .route("/settlements", post(complete_settlement))
        .layer(from_fn(validate_json::<CompleteSettlementRequest>))
        .layer(from_fn_with_state(throttle, throttle_middleware));

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Settlement workflow
                .merge(settlements)
                .route("/settlements/:id", get(get_settlement_status))
                // Bridge swap endpoints (client funding flow)
                .route("/bridge/swaps", post(create_swap))
                .route("/bridge/swaps/:id", get(get_swap))
                // Payout processor lookups
                .route("/payout/currencies", get(get_currencies))
                .route("/payout/institutions/:currency", get(get_institutions))
                .route("/payout/verify-account", post(verify_account))
                .route("/payout/rates/:token/:amount/:currency", get(get_rate))
                // Treasury view
                .route("/treasury/balance/:asset", get(get_treasury_balance)),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

/// Serve until ctrl-c, then flip the shutdown signal so in-flight
/// settlement polls release their claims before the process exits.
pub async fn run_server(
    app: Router,
    bind_address: &str,
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("🔻 Shutdown signal received, cancelling in-flight settlements");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
