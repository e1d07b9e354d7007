use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::chain::Asset;
use crate::error::AppError;
use crate::settlement::store::StateTransition;
use crate::settlement::{SettlementReceipt, SettlementRecord, SettlementRequest};

// ========== REQUEST MODELS ==========

/// Request to settle a completed swap into a fiat payout
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteSettlementRequest {
    #[validate(length(min = 1, message = "swap_id is required"))]
    pub swap_id: String,

    /// Asset symbol the treasury receives, e.g. "USDC"
    #[validate(length(min = 1, message = "asset is required"))]
    pub asset: String,

    #[validate(length(min = 3, max = 3, message = "fiat_currency must be a 3-letter code"))]
    pub fiat_currency: String,

    /// Processor institution code for the receiving bank
    #[validate(length(min = 1, message = "payout_institution is required"))]
    pub payout_institution: String,

    #[validate(length(min = 1, message = "account_identifier is required"))]
    pub account_identifier: String,

    #[validate(length(min = 1, message = "account_name is required"))]
    pub account_name: String,
}

impl TryFrom<CompleteSettlementRequest> for SettlementRequest {
    type Error = AppError;

    fn try_from(request: CompleteSettlementRequest) -> Result<Self, Self::Error> {
        let asset: Asset = request
            .asset
            .parse()
            .map_err(|e: crate::error::ChainError| AppError::InvalidInput(e.to_string()))?;

        Ok(SettlementRequest {
            swap_id: request.swap_id,
            asset,
            fiat_currency: request.fiat_currency.to_uppercase(),
            payout_institution: request.payout_institution,
            account_identifier: request.account_identifier,
            account_name: request.account_name,
        })
    }
}

// ========== RESPONSE MODELS ==========

/// Successful settlement response
#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub attempt_id: Uuid,
    pub swap_id: String,
    pub asset: String,
    pub amount: String,
    pub rate: String,
    pub order_id: String,
    pub tx_hash: String,
    pub status: String,
}

impl From<SettlementReceipt> for SettlementResponse {
    fn from(receipt: SettlementReceipt) -> Self {
        Self {
            attempt_id: receipt.attempt_id,
            swap_id: receipt.swap_id,
            asset: receipt.asset.symbol().to_string(),
            amount: receipt.amount.to_string(),
            rate: receipt.rate.to_string(),
            order_id: receipt.order_id,
            tx_hash: receipt.tx_hash,
            status: "transfer_submitted".to_string(),
        }
    }
}

/// Settlement attempt status, including its full transition history
#[derive(Debug, Serialize)]
pub struct SettlementStatusResponse {
    pub attempt_id: Uuid,
    pub swap_id: String,
    pub asset: String,
    pub state: String,
    pub expected_amount: Option<String>,
    pub order_id: Option<String>,
    pub tx_hash: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub transitions: Vec<StateTransition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SettlementRecord> for SettlementStatusResponse {
    fn from(record: SettlementRecord) -> Self {
        Self {
            attempt_id: record.id,
            swap_id: record.swap_id,
            asset: record.asset.symbol().to_string(),
            state: record.state.as_str().to_string(),
            expected_amount: record.expected_amount.map(|a| a.to_string()),
            order_id: record.order_id,
            tx_hash: record.tx_hash,
            error_code: record.error_code,
            error_message: record.error_message,
            transitions: record.transitions,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Treasury balance view for one asset
#[derive(Debug, Serialize)]
pub struct TreasuryBalanceResponse {
    pub asset: String,
    pub address: String,
    pub balance: String,
    /// Sum of claims held by in-flight settlement attempts
    pub reserved: String,
    pub available: String,
}

impl TreasuryBalanceResponse {
    pub fn new(asset: Asset, address: String, balance: Decimal, reserved: Decimal) -> Self {
        Self {
            asset: asset.symbol().to_string(),
            address,
            balance: balance.to_string(),
            reserved: reserved.to_string(),
            available: (balance - reserved).max(Decimal::ZERO).to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_request() -> CompleteSettlementRequest {
        CompleteSettlementRequest {
            swap_id: "swap-1".to_string(),
            asset: "USDC".to_string(),
            fiat_currency: "ngn".to_string(),
            payout_institution: "FBNINGLA".to_string(),
            account_identifier: "0123456789".to_string(),
            account_name: "Ada Obi".to_string(),
        }
    }

    #[test]
    fn test_request_converts_to_domain_with_uppercased_currency() {
        let request = valid_request();
        assert!(request.validate().is_ok());

        let domain = SettlementRequest::try_from(request).unwrap();
        assert_eq!(domain.asset, Asset::Usdc);
        assert_eq!(domain.fiat_currency, "NGN");
    }

    #[test]
    fn test_unknown_asset_is_rejected() {
        let mut request = valid_request();
        request.asset = "DOGE".to_string();

        let err = SettlementRequest::try_from(request).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_currency_length_is_validated() {
        let mut request = valid_request();
        request.fiat_currency = "NAIRA".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_balance_view_nets_reservations() {
        let view = TreasuryBalanceResponse::new(
            Asset::Usdc,
            "0xff".to_string(),
            dec!(100),
            dec!(60),
        );
        assert_eq!(view.available, "40");

        let overdrawn = TreasuryBalanceResponse::new(
            Asset::Usdc,
            "0xff".to_string(),
            dec!(10),
            dec!(60),
        );
        assert_eq!(overdrawn.available, "0");
    }
}
