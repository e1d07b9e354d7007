// Settlement orchestration: bridged funds in, fiat payout order out.
//
// Completing a settlement chains five external round trips, strictly in
// this order: swap quote -> balance polling -> fiat rate -> payout order
// -> on-chain transfer. The rate is computed on the confirmed amount, the
// order must exist before the transfer so the pay-in address is known,
// and the transfer comes last because it is the only irreversible step.
pub mod reservation;
pub mod store;

pub use reservation::{FundsCheck, ReservationLedger};
pub use store::{SettlementRecord, SettlementState, SettlementStore};

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::bridge::SwapSource;
use crate::chain::{Asset, TreasuryGateway};
use crate::error::{BridgeError, PayoutError, SettlementError};
use crate::payout::{OrderRecipient, OrderSpec, PayoutProcessor};

/// One settlement request, immutable once accepted
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub swap_id: String,
    pub asset: Asset,
    pub fiat_currency: String,
    pub payout_institution: String,
    pub account_identifier: String,
    pub account_name: String,
}

impl SettlementRequest {
    fn validate(&self) -> Result<(), SettlementError> {
        let fields = [
            ("swap_id", &self.swap_id),
            ("fiat_currency", &self.fiat_currency),
            ("payout_institution", &self.payout_institution),
            ("account_identifier", &self.account_identifier),
            ("account_name", &self.account_name),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(SettlementError::InvalidRequest(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Successful settlement result
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub attempt_id: Uuid,
    pub swap_id: String,
    pub asset: Asset,
    pub amount: Decimal,
    pub rate: Decimal,
    pub order_id: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Cadence of treasury balance checks while awaiting bridged funds
    pub poll_interval: Duration,
    /// Balance check budget; interval x attempts bounds the whole wait
    pub poll_attempts: u32,
    /// Network label passed to the payout processor
    pub network: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            poll_attempts: 30,
            network: "base".to_string(),
        }
    }
}

/// Stable idempotency reference for a payout order, derived from the swap
/// id so a retried attempt maps to the same order on the processor side
pub fn order_reference(swap_id: &str) -> String {
    sha256::digest(swap_id)
}

/// Releases a claim if the settlement future never reached a state where
/// the claim must outlive it. A dropped future (caller disconnect) or a
/// pre-order failure must not leave the swap id locked out; once the
/// treasury verifiably holds the funds and an order may exist, the guard
/// is disarmed and the claim stays for operator reconciliation.
struct ClaimGuard {
    reservations: Arc<ReservationLedger>,
    swap_id: String,
    armed: bool,
}

impl ClaimGuard {
    fn new(reservations: Arc<ReservationLedger>, swap_id: String) -> Self {
        Self {
            reservations,
            swap_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.armed {
            self.reservations.release(&self.swap_id);
        }
    }
}

/// Drives one settlement attempt through its state machine.
///
/// Collaborators are trait objects so the workflow can be exercised
/// against stubs; production wiring injects the bridge, payout, and
/// treasury clients.
pub struct SettlementOrchestrator {
    bridge: Arc<dyn SwapSource>,
    payout: Arc<dyn PayoutProcessor>,
    treasury: Arc<dyn TreasuryGateway>,
    reservations: Arc<ReservationLedger>,
    store: Arc<SettlementStore>,
    config: OrchestratorConfig,
}

impl SettlementOrchestrator {
    pub fn new(
        bridge: Arc<dyn SwapSource>,
        payout: Arc<dyn PayoutProcessor>,
        treasury: Arc<dyn TreasuryGateway>,
        reservations: Arc<ReservationLedger>,
        store: Arc<SettlementStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            bridge,
            payout,
            treasury,
            reservations,
            store,
            config,
        }
    }

    /// Run one settlement attempt to a terminal state.
    ///
    /// `shutdown` is observed at every polling iteration boundary so a
    /// service shutdown does not leave the claim held indefinitely.
    #[instrument(skip(self, request, shutdown), fields(swap_id = %request.swap_id, asset = %request.asset))]
    pub async fn settle(
        &self,
        request: SettlementRequest,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SettlementReceipt, SettlementError> {
        request.validate()?;

        let attempt_id = self.store.create(&request.swap_id, request.asset);
        info!("📦 Settlement attempt {} started", attempt_id);

        // 1. Resolve the expected amount; without it there is nothing to
        // poll for, so any lookup failure is immediately terminal.
        let quote = match self.bridge.swap_quote(&request.swap_id).await {
            Ok(quote) => quote,
            Err(e) => return Err(self.fail(attempt_id, SettlementError::SwapLookup(e))),
        };
        let expected = quote.min_receive_amount;
        if expected <= Decimal::ZERO {
            let err = SettlementError::SwapLookup(BridgeError::Upstream(format!(
                "non-positive min receive amount: {}",
                expected
            )));
            return Err(self.fail(attempt_id, err));
        }
        self.store.set_expected_amount(attempt_id, expected);

        // 2. Claim the amount before confirming funds, so a concurrent
        // attempt cannot count the same deposit as its own. The guard
        // releases the claim if this future is abandoned mid-flight.
        if let Err(e) = self
            .reservations
            .reserve(&request.swap_id, request.asset, expected)
        {
            return Err(self.fail(attempt_id, e));
        }
        let mut claim = ClaimGuard::new(self.reservations.clone(), request.swap_id.clone());

        if let Err(e) = self.await_funds(&request, expected, &mut shutdown).await {
            return Err(self.fail(attempt_id, e));
        }
        self.store
            .transition(attempt_id, SettlementState::FundsConfirmed);

        // 3. Rate on the confirmed amount. Not retried: a transient outage
        // should surface to the caller rather than hold the claim open.
        let rate = match self
            .payout
            .fetch_rate(request.asset, expected, &request.fiat_currency)
            .await
        {
            Ok(rate) => rate,
            Err(e) => {
                return Err(self.fail(attempt_id, SettlementError::RateUnavailable(e.to_string())));
            }
        };
        self.store
            .transition(attempt_id, SettlementState::RateObtained);
        info!(
            "💱 Rate obtained: {} {}/{}",
            rate, request.fiat_currency, request.asset
        );

        // 4. Order before transfer: the pay-in address comes from the
        // order. From here on the treasury holds claimed funds and an
        // order may exist at the processor, so a failure or an abandoned
        // future keeps the claim held for operator reconciliation.
        claim.disarm();

        let spec = OrderSpec {
            amount: expected,
            token: request.asset.symbol().to_string(),
            rate,
            network: self.config.network.clone(),
            recipient: OrderRecipient {
                institution: request.payout_institution.clone(),
                account_identifier: request.account_identifier.clone(),
                account_name: request.account_name.clone(),
                currency: request.fiat_currency.clone(),
            },
            return_address: self.treasury.address(),
            reference: order_reference(&request.swap_id),
        };

        let order = match self.payout.create_order(spec).await {
            Ok(order) => order,
            Err(PayoutError::MalformedOrder(msg)) => {
                return Err(self.fail(attempt_id, SettlementError::MalformedOrderResponse(msg)));
            }
            Err(e) => {
                return Err(self.fail(attempt_id, SettlementError::OrderCreation(e.to_string())));
            }
        };
        self.store.set_order(attempt_id, &order.id);
        self.store
            .transition(attempt_id, SettlementState::OrderCreated);

        // 5. The transfer is irreversible and attempted exactly once.
        let tx_hash = match self
            .treasury
            .transfer(request.asset, expected, &order.receive_address)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                let err = SettlementError::Incomplete {
                    order_id: order.id.clone(),
                    message: e.to_string(),
                };
                return Err(self.fail(attempt_id, err));
            }
        };

        // The claim becomes an outbound hold: the submitted transfer
        // keeps counting against observed balances until it lands.
        self.reservations.consume(&request.swap_id);
        self.store.complete(attempt_id, &tx_hash);
        info!(
            "✅ Settlement {} complete: {} {} paid to order {}, tx {}",
            attempt_id, expected, request.asset, order.id, tx_hash
        );

        Ok(SettlementReceipt {
            attempt_id,
            swap_id: request.swap_id,
            asset: request.asset,
            amount: expected,
            rate,
            order_id: order.id,
            tx_hash,
        })
    }

    /// Bounded, cancellable balance polling. Each check hands the
    /// observed balance to the ledger, which funds the claim atomically
    /// the first time enough unclaimed balance is available (>= on
    /// purpose, since bridged amounts can exceed the guaranteed minimum).
    /// When the budget runs out while the balance was sufficient but
    /// spoken for by other attempts, the caller is told the funds are
    /// claimed rather than missing.
    async fn await_funds(
        &self,
        request: &SettlementRequest,
        expected: Decimal,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SettlementError> {
        let max = self.config.poll_attempts;
        let mut claimed_away = false;

        for check in 1..=max {
            if *shutdown.borrow() {
                return Err(SettlementError::Cancelled);
            }

            match self.treasury.balance_of(request.asset).await {
                Ok(balance) => match self.reservations.try_confirm(&request.swap_id, balance) {
                    FundsCheck::Confirmed => {
                        info!(
                            "💰 Funds confirmed on check {}/{}: {} {} claimed of {} on hand",
                            check, max, expected, request.asset, balance
                        );
                        return Ok(());
                    }
                    FundsCheck::ClaimedByOthers => {
                        claimed_away = true;
                        info!(
                            "⏳ Check {}/{}: {} {} on hand is accounted for by other attempts",
                            check, max, balance, request.asset
                        );
                    }
                    FundsCheck::Insufficient => {
                        claimed_away = false;
                        info!(
                            "⏳ Awaiting funds, check {}/{}: {} of {} {} on hand",
                            check, max, balance, expected, request.asset
                        );
                    }
                },
                // Read failures are retryable inside the bounded loop; the
                // next check may succeed.
                Err(e) => warn!("Balance read failed on check {}/{}: {}", check, max, e),
            }

            if check < max {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return Err(SettlementError::Cancelled);
                        }
                    }
                }
            }
        }

        if claimed_away {
            return Err(SettlementError::FundsAlreadyClaimed(
                request.swap_id.clone(),
            ));
        }
        Err(SettlementError::TimedOut {
            attempts: max,
            waited_secs: self.config.poll_interval.as_secs() * max as u64,
        })
    }

    fn fail(&self, attempt_id: Uuid, err: SettlementError) -> SettlementError {
        let state = if matches!(err, SettlementError::TimedOut { .. }) {
            SettlementState::TimedOut
        } else {
            SettlementState::Failed
        };

        error!("❌ Settlement {} failed: {}", attempt_id, err);
        self.store
            .fail(attempt_id, state, err.error_code(), &err.to_string());
        err
    }
}
