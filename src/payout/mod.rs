/// Fiat payout processor integration: conversion rates, payout orders, and
/// the opaque KYC-adjacent lookups (currencies, institutions, account
/// verification) proxied for the client UI.
pub mod client;

pub use client::{OrderRecipient, OrderSpec, PayoutClient, PayoutConfig, PayoutOrder};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::chain::Asset;
use crate::error::PayoutError;

/// Processor seam used by the orchestrator, mockable in tests
#[async_trait]
pub trait PayoutProcessor: Send + Sync {
    /// Fiat conversion rate for an asset/amount/currency triple
    async fn fetch_rate(
        &self,
        asset: Asset,
        amount: Decimal,
        currency: &str,
    ) -> Result<Decimal, PayoutError>;

    /// Open a payout order; the returned order carries the on-chain
    /// address the treasury must pay to settle it
    async fn create_order(&self, spec: OrderSpec) -> Result<PayoutOrder, PayoutError>;
}
