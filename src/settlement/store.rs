use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::chain::Asset;

/// Lifecycle states of a settlement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    AwaitingFunds,
    FundsConfirmed,
    RateObtained,
    OrderCreated,
    TransferSubmitted,
    TimedOut,
    Failed,
}

impl SettlementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementState::AwaitingFunds => "awaiting_funds",
            SettlementState::FundsConfirmed => "funds_confirmed",
            SettlementState::RateObtained => "rate_obtained",
            SettlementState::OrderCreated => "order_created",
            SettlementState::TransferSubmitted => "transfer_submitted",
            SettlementState::TimedOut => "timed_out",
            SettlementState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SettlementState::TransferSubmitted
                | SettlementState::TimedOut
                | SettlementState::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub state: SettlementState,
    pub at: DateTime<Utc>,
}

/// One settlement attempt's recorded history, kept for status queries and
/// operator reconciliation
#[derive(Debug, Clone)]
pub struct SettlementRecord {
    pub id: Uuid,
    pub swap_id: String,
    pub asset: Asset,
    pub state: SettlementState,
    pub transitions: Vec<StateTransition>,
    pub expected_amount: Option<Decimal>,
    pub order_id: Option<String>,
    pub tx_hash: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory store of settlement attempts and their state transitions
#[derive(Default)]
pub struct SettlementStore {
    inner: RwLock<HashMap<Uuid, SettlementRecord>>,
}

impl SettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, swap_id: &str, asset: Asset) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let record = SettlementRecord {
            id,
            swap_id: swap_id.to_string(),
            asset,
            state: SettlementState::AwaitingFunds,
            transitions: vec![StateTransition {
                state: SettlementState::AwaitingFunds,
                at: now,
            }],
            expected_amount: None,
            order_id: None,
            tx_hash: None,
            error_code: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        self.inner.write().insert(id, record);
        id
    }

    pub fn transition(&self, id: Uuid, state: SettlementState) {
        let mut inner = self.inner.write();
        if let Some(record) = inner.get_mut(&id) {
            let now = Utc::now();
            record.state = state;
            record.transitions.push(StateTransition { state, at: now });
            record.updated_at = now;
        }
    }

    pub fn set_expected_amount(&self, id: Uuid, amount: Decimal) {
        if let Some(record) = self.inner.write().get_mut(&id) {
            record.expected_amount = Some(amount);
        }
    }

    pub fn set_order(&self, id: Uuid, order_id: &str) {
        if let Some(record) = self.inner.write().get_mut(&id) {
            record.order_id = Some(order_id.to_string());
        }
    }

    pub fn complete(&self, id: Uuid, tx_hash: &str) {
        let mut inner = self.inner.write();
        if let Some(record) = inner.get_mut(&id) {
            let now = Utc::now();
            record.state = SettlementState::TransferSubmitted;
            record.tx_hash = Some(tx_hash.to_string());
            record.transitions.push(StateTransition {
                state: SettlementState::TransferSubmitted,
                at: now,
            });
            record.updated_at = now;
        }
    }

    pub fn fail(&self, id: Uuid, state: SettlementState, code: &str, message: &str) {
        let mut inner = self.inner.write();
        if let Some(record) = inner.get_mut(&id) {
            let now = Utc::now();
            record.state = state;
            record.error_code = Some(code.to_string());
            record.error_message = Some(message.to_string());
            record.transitions.push(StateTransition { state, at: now });
            record.updated_at = now;
        }
    }

    pub fn get(&self, id: Uuid) -> Option<SettlementRecord> {
        self.inner.read().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_records_transition_history() {
        let store = SettlementStore::new();
        let id = store.create("swap-1", Asset::Usdc);

        store.set_expected_amount(id, dec!(100));
        store.transition(id, SettlementState::FundsConfirmed);
        store.transition(id, SettlementState::RateObtained);
        store.complete(id, "0xabc");

        let record = store.get(id).unwrap();
        assert_eq!(record.state, SettlementState::TransferSubmitted);
        assert_eq!(record.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(record.expected_amount, Some(dec!(100)));

        let states: Vec<_> = record.transitions.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            vec![
                SettlementState::AwaitingFunds,
                SettlementState::FundsConfirmed,
                SettlementState::RateObtained,
                SettlementState::TransferSubmitted,
            ]
        );
    }

    #[test]
    fn test_failure_captures_error_kind() {
        let store = SettlementStore::new();
        let id = store.create("swap-2", Asset::Eth);

        store.fail(id, SettlementState::TimedOut, "FUNDS_TIMEOUT", "no funds");

        let record = store.get(id).unwrap();
        assert_eq!(record.state, SettlementState::TimedOut);
        assert!(record.state.is_terminal());
        assert_eq!(record.error_code.as_deref(), Some("FUNDS_TIMEOUT"));
    }
}
