use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::bridge::SwapSource;
use crate::error::BridgeError;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Deposit-side quote of a swap: the guaranteed lower bound of what the
/// treasury will receive on the destination chain
#[derive(Debug, Clone, Deserialize)]
pub struct SwapQuote {
    pub min_receive_amount: Decimal,
}

/// The provider wraps every payload in a `data` envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    data: serde_json::Value,
}

/// HTTP client for the cross-chain swap provider
pub struct BridgeClient {
    client: Client,
    config: BridgeConfig,
}

impl BridgeClient {
    pub fn new(client: Client, config: BridgeConfig) -> Self {
        Self { client, config }
    }

    /// Create a swap on behalf of the client-facing funding flow. The body
    /// is the provider's own request schema, passed through untouched.
    pub async fn create_swap(
        &self,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        let url = format!("{}/swaps", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("X-LS-APIKEY", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::Upstream(format!("swap creation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Upstream(format!(
                "swap creation rejected with status {}",
                status
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| BridgeError::Upstream(format!("malformed swap response: {}", e)))?;

        info!("🔁 Swap created with bridge provider");
        Ok(envelope.data)
    }

    /// Fetch the full swap payload, for the client-facing status view
    pub async fn get_swap(&self, swap_id: &str) -> Result<serde_json::Value, BridgeError> {
        let url = format!("{}/swaps/{}", self.config.base_url, swap_id);

        let response = self
            .client
            .get(&url)
            .header("X-LS-APIKEY", &self.config.api_key)
            .send()
            .await
            .map_err(|e| BridgeError::Upstream(format!("swap lookup request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BridgeError::SwapNotFound(swap_id.to_string()));
        }
        if !status.is_success() {
            return Err(BridgeError::Upstream(format!(
                "swap lookup failed with status {}",
                status
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| BridgeError::Upstream(format!("malformed swap response: {}", e)))?;

        Ok(envelope.data)
    }
}

#[async_trait]
impl SwapSource for BridgeClient {
    async fn swap_quote(&self, swap_id: &str) -> Result<SwapQuote, BridgeError> {
        let data = self.get_swap(swap_id).await?;

        let quote = data
            .get("quote")
            .cloned()
            .ok_or_else(|| BridgeError::Upstream("swap response has no quote".to_string()))?;

        serde_json::from_value(quote)
            .map_err(|e| BridgeError::Upstream(format!("malformed swap quote: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_decodes_from_provider_payload() {
        let payload = serde_json::json!({
            "min_receive_amount": 99.95,
            "receive_amount": 100.00,
            "total_fee": 0.05,
        });

        let quote: SwapQuote = serde_json::from_value(payload).unwrap();
        assert_eq!(quote.min_receive_amount, dec!(99.95));
    }

    #[test]
    fn test_envelope_unwraps_data() {
        let raw = r#"{"data": {"quote": {"min_receive_amount": 50.0}}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.data.get("quote").is_some());
    }
}
