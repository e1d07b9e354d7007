/// Cross-chain swap provider integration.
///
/// The orchestrator only consumes the deposit-side quote of a previously
/// created swap; swap creation is proxied for the client-facing funding
/// flow and never invoked server-side.
pub mod client;

pub use client::{BridgeClient, BridgeConfig, SwapQuote};

use async_trait::async_trait;

use crate::error::BridgeError;

/// Read seam over the swap provider, mockable in orchestrator tests
#[async_trait]
pub trait SwapSource: Send + Sync {
    /// Fetch the quote of an existing swap, notably its guaranteed
    /// minimum receive amount
    async fn swap_quote(&self, swap_id: &str) -> Result<SwapQuote, BridgeError>;
}
