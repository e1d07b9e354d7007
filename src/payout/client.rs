use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chain::Asset;
use crate::error::PayoutError;
use crate::payout::PayoutProcessor;

#[derive(Debug, Clone)]
pub struct PayoutConfig {
    pub base_url: String,
    pub api_key: String,
    /// Network label the processor expects for treasury-side deposits
    pub network: String,
}

/// Order request sent to the processor. `amount` is always the swap's
/// guaranteed minimum receive amount, never a client-supplied figure.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSpec {
    pub amount: Decimal,
    pub token: String,
    pub rate: Decimal,
    pub network: String,
    pub recipient: OrderRecipient,
    #[serde(rename = "returnAddress")]
    pub return_address: String,
    /// Stable idempotency reference, derived from the swap id, so a
    /// retried attempt cannot open a second order
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRecipient {
    pub institution: String,
    #[serde(rename = "accountIdentifier")]
    pub account_identifier: String,
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub currency: String,
}

/// A created payout order, with the address the treasury must pay
#[derive(Debug, Clone)]
pub struct PayoutOrder {
    pub id: String,
    pub receive_address: String,
}

/// Raw order-creation payload. `receiveAddress` is optional here on
/// purpose: the processor contract does not promise it, and its absence is
/// reported as a distinct malformed-response error rather than assumed.
#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(rename = "receiveAddress")]
    receive_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: serde_json::Value,
}

/// HTTP client for the fiat payout processor
pub struct PayoutClient {
    client: Client,
    config: PayoutConfig,
}

impl PayoutClient {
    pub fn new(client: Client, config: PayoutConfig) -> Self {
        Self { client, config }
    }

    async fn get_data(&self, url: &str, context: &str) -> Result<serde_json::Value, PayoutError> {
        let response = self
            .client
            .get(url)
            .header("API-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| PayoutError::Upstream(format!("{} request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PayoutError::Upstream(format!(
                "{} failed with status {}",
                context, status
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| PayoutError::Upstream(format!("malformed {} response: {}", context, e)))?;

        Ok(envelope.data)
    }

    /// Supported payout currencies, consumed opaquely by the UI
    pub async fn get_currencies(&self) -> Result<serde_json::Value, PayoutError> {
        let url = format!("{}/currencies", self.config.base_url);
        self.get_data(&url, "currency list").await
    }

    /// Receiving institutions for a payout currency, consumed opaquely
    pub async fn get_institutions(
        &self,
        currency: &str,
    ) -> Result<serde_json::Value, PayoutError> {
        let url = format!("{}/institutions/{}", self.config.base_url, currency);
        self.get_data(&url, "institution list").await
    }

    /// Verify a bank account holder name, consumed opaquely
    pub async fn verify_account(
        &self,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, PayoutError> {
        let url = format!("{}/verify-account", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("API-Key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PayoutError::Upstream(format!("account verification failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PayoutError::Upstream(format!(
                "account verification failed with status {}",
                status
            )));
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            PayoutError::Upstream(format!("malformed verification response: {}", e))
        })?;

        Ok(envelope.data)
    }
}

#[async_trait]
impl PayoutProcessor for PayoutClient {
    async fn fetch_rate(
        &self,
        asset: Asset,
        amount: Decimal,
        currency: &str,
    ) -> Result<Decimal, PayoutError> {
        let url = format!(
            "{}/rates/{}/{}/{}?network={}",
            self.config.base_url,
            asset.symbol(),
            amount,
            currency,
            self.config.network,
        );

        let response = self
            .client
            .get(&url)
            .header("API-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| PayoutError::Upstream(format!("rate request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(PayoutError::RateUnavailable {
                asset: asset.symbol().to_string(),
                currency: currency.to_string(),
            });
        }
        if !status.is_success() {
            return Err(PayoutError::Upstream(format!(
                "rate lookup failed with status {}",
                status
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| PayoutError::Upstream(format!("malformed rate response: {}", e)))?;

        // The rate arrives as a bare string or number in the data field
        parse_rate(&envelope.data).ok_or_else(|| PayoutError::RateUnavailable {
            asset: asset.symbol().to_string(),
            currency: currency.to_string(),
        })
    }

    async fn create_order(&self, spec: OrderSpec) -> Result<PayoutOrder, PayoutError> {
        let url = format!("{}/sender/orders", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("API-Key", &self.config.api_key)
            .json(&spec)
            .send()
            .await
            .map_err(|e| PayoutError::OrderCreation(format!("order request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PayoutError::OrderCreation(format!(
                "processor rejected order with status {}",
                status
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| PayoutError::MalformedOrder(format!("unreadable order body: {}", e)))?;

        let order: OrderResponse = serde_json::from_value(envelope.data)
            .map_err(|e| PayoutError::MalformedOrder(format!("unexpected order shape: {}", e)))?;

        let receive_address = order.receive_address.ok_or_else(|| {
            PayoutError::MalformedOrder(format!("order {} has no receiveAddress", order.id))
        })?;

        info!("🧾 Payout order {} created, pay-in address {}", order.id, receive_address);
        Ok(PayoutOrder {
            id: order.id,
            receive_address,
        })
    }
}

fn parse_rate(data: &serde_json::Value) -> Option<Decimal> {
    match data {
        serde_json::Value::String(s) => s.parse().ok(),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rate_parses_from_string_and_number() {
        assert_eq!(parse_rate(&serde_json::json!("1547.25")), Some(dec!(1547.25)));
        assert_eq!(parse_rate(&serde_json::json!(1547.25)), Some(dec!(1547.25)));
        assert_eq!(parse_rate(&serde_json::json!({"rate": 1.0})), None);
    }

    #[test]
    fn test_order_spec_uses_processor_field_names() {
        let spec = OrderSpec {
            amount: dec!(100),
            token: "USDC".to_string(),
            rate: dec!(1500),
            network: "base".to_string(),
            recipient: OrderRecipient {
                institution: "FBNINGLA".to_string(),
                account_identifier: "0123456789".to_string(),
                account_name: "Ada Obi".to_string(),
                currency: "NGN".to_string(),
            },
            return_address: "0xtreasury".to_string(),
            reference: "ref".to_string(),
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("returnAddress").is_some());
        assert!(json["recipient"].get("accountIdentifier").is_some());
        assert!(json["recipient"].get("accountName").is_some());
    }

    #[test]
    fn test_missing_receive_address_is_detected() {
        let data = serde_json::json!({"id": "ord_1"});
        let order: OrderResponse = serde_json::from_value(data).unwrap();
        assert!(order.receive_address.is_none());
    }
}
