use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Bridge provider error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Payout processor error: {0}")]
    Payout(#[from] PayoutError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External error: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Treasury chain access errors (balance reads and transfer submission)
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Chain read failed: {0}")]
    ReadFailed(String),

    #[error("Transfer submission failed: {0}")]
    SubmissionFailed(String),
}

/// Cross-chain swap provider errors
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Swap not found: {0}")]
    SwapNotFound(String),

    #[error("Bridge provider unavailable: {0}")]
    Upstream(String),
}

/// Fiat payout processor errors
#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("No payout rate for {asset}/{currency}")]
    RateUnavailable { asset: String, currency: String },

    #[error("Order creation failed: {0}")]
    OrderCreation(String),

    #[error("Malformed order response: {0}")]
    MalformedOrder(String),

    #[error("Payout processor unavailable: {0}")]
    Upstream(String),
}

/// Terminal failure kinds of the settlement orchestrator.
///
/// Ordered roughly by severity: variants up to `TimedOut` mean no funds have
/// moved by our action; `OrderCreation`/`MalformedOrderResponse` mean funds
/// sit in the treasury with no processor order; `Incomplete` means an order
/// exists at the processor with no payment.
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Invalid settlement request: {0}")]
    InvalidRequest(String),

    #[error("Swap lookup failed: {0}")]
    SwapLookup(#[source] BridgeError),

    #[error("Funds already claimed for swap {0}")]
    FundsAlreadyClaimed(String),

    #[error("Funds not received after {attempts} balance checks ({waited_secs}s)")]
    TimedOut { attempts: u32, waited_secs: u64 },

    #[error("Payout rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("Payout order creation failed: {0}")]
    OrderCreation(String),

    #[error("Payout order response missing receive address: {0}")]
    MalformedOrderResponse(String),

    #[error("Transfer failed after order {order_id} was created: {message}")]
    Incomplete { order_id: String, message: String },

    #[error("Settlement cancelled before completion")]
    Cancelled,
}

impl SettlementError {
    /// Stable machine-readable code, used in responses and the attempt store
    pub fn error_code(&self) -> &'static str {
        match self {
            SettlementError::InvalidRequest(_) => "INVALID_REQUEST",
            SettlementError::SwapLookup(_) => "SWAP_LOOKUP_FAILED",
            SettlementError::FundsAlreadyClaimed(_) => "FUNDS_ALREADY_CLAIMED",
            SettlementError::TimedOut { .. } => "FUNDS_TIMEOUT",
            SettlementError::RateUnavailable(_) => "RATE_UNAVAILABLE",
            SettlementError::OrderCreation(_) => "ORDER_CREATION_FAILED",
            SettlementError::MalformedOrderResponse(_) => "MALFORMED_ORDER_RESPONSE",
            SettlementError::Incomplete { .. } => "SETTLEMENT_INCOMPLETE",
            SettlementError::Cancelled => "SETTLEMENT_CANCELLED",
        }
    }

    /// Whether the treasury still holds funds claimed for this attempt,
    /// requiring operator reconciliation
    pub fn funds_held(&self) -> bool {
        matches!(
            self,
            SettlementError::OrderCreation(_)
                | SettlementError::MalformedOrderResponse(_)
                | SettlementError::Incomplete { .. }
        )
    }
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Settlement(err) => return settlement_response(err),
            AppError::Chain(ChainError::UnsupportedAsset(asset)) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_ASSET",
                format!("Asset {} is not supported", asset),
                None,
            ),
            AppError::Chain(ChainError::ReadFailed(msg)) => (
                StatusCode::BAD_GATEWAY,
                "CHAIN_READ_FAILED",
                format!("Treasury balance read failed: {}", msg),
                None,
            ),
            AppError::Chain(ChainError::SubmissionFailed(msg)) => (
                StatusCode::BAD_GATEWAY,
                "TRANSFER_SUBMISSION_FAILED",
                format!("Transfer submission failed: {}", msg),
                None,
            ),
            AppError::Bridge(BridgeError::SwapNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "SWAP_NOT_FOUND",
                format!("Swap not found: {}", id),
                None,
            ),
            AppError::Bridge(BridgeError::Upstream(msg)) => (
                StatusCode::BAD_GATEWAY,
                "BRIDGE_UPSTREAM_ERROR",
                msg,
                None,
            ),
            AppError::Payout(PayoutError::RateUnavailable { asset, currency }) => (
                StatusCode::BAD_GATEWAY,
                "RATE_UNAVAILABLE",
                format!("No payout rate for {}/{}", asset, currency),
                Some(serde_json::json!({"asset": asset, "currency": currency})),
            ),
            AppError::Payout(PayoutError::OrderCreation(msg)) => (
                StatusCode::BAD_GATEWAY,
                "ORDER_CREATION_FAILED",
                msg,
                None,
            ),
            AppError::Payout(PayoutError::MalformedOrder(msg)) => (
                StatusCode::BAD_GATEWAY,
                "MALFORMED_ORDER_RESPONSE",
                msg,
                None,
            ),
            AppError::Payout(PayoutError::Upstream(msg)) => (
                StatusCode::BAD_GATEWAY,
                "PAYOUT_UPSTREAM_ERROR",
                msg,
                None,
            ),
            AppError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg, None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::External(_) => (
                StatusCode::BAD_GATEWAY,
                "EXTERNAL_ERROR",
                "An upstream service error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

/// Settlement failures carry the richest caller contract: a distinct status
/// and code per kind, plus a `funds_held` marker for the states that need
/// operator reconciliation. Raw upstream payloads are never forwarded.
fn settlement_response(err: SettlementError) -> Response {
    let status = match &err {
        SettlementError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SettlementError::SwapLookup(BridgeError::SwapNotFound(_)) => StatusCode::NOT_FOUND,
        SettlementError::SwapLookup(_) => StatusCode::BAD_GATEWAY,
        SettlementError::FundsAlreadyClaimed(_) => StatusCode::CONFLICT,
        SettlementError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        SettlementError::RateUnavailable(_) => StatusCode::BAD_GATEWAY,
        SettlementError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        SettlementError::OrderCreation(_)
        | SettlementError::MalformedOrderResponse(_)
        | SettlementError::Incomplete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let details = match &err {
        SettlementError::TimedOut { attempts, waited_secs } => Some(serde_json::json!({
            "attempts": attempts,
            "waited_secs": waited_secs,
        })),
        SettlementError::Incomplete { order_id, .. } => Some(serde_json::json!({
            "order_id": order_id,
            "funds_held": true,
        })),
        err if err.funds_held() => Some(serde_json::json!({"funds_held": true})),
        _ => None,
    };

    let body = Json(ErrorResponse {
        error: err.to_string(),
        error_code: err.error_code().to_string(),
        details,
    });

    (status, body).into_response()
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::External(format!("HTTP request error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
