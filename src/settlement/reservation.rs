use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::chain::Asset;
use crate::error::SettlementError;

/// How long a submitted transfer keeps counting against observed
/// balances. Until the transaction lands, a balance read still includes
/// the spent funds; the hold covers that inclusion lag with a wide
/// margin.
const OUTBOUND_HOLD: Duration = Duration::from_secs(600);

/// A claim on part of the treasury balance for one in-flight settlement
/// attempt. `funded` is set once the claim has been matched against an
/// observed balance; only funded claims count against other attempts.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub swap_id: String,
    pub asset: Asset,
    pub amount: Decimal,
    pub funded: bool,
}

/// Outcome of matching a claim against an observed balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsCheck {
    /// Enough unclaimed balance was available; the claim is now funded
    Confirmed,
    /// The balance alone would cover the claim, but other attempts'
    /// funded claims or in-flight outbound transfers already account
    /// for it
    ClaimedByOthers,
    /// Not enough balance yet, before any netting
    Insufficient,
}

#[derive(Debug)]
struct OutboundHold {
    asset: Asset,
    amount: Decimal,
    submitted_at: Instant,
}

#[derive(Default)]
struct Book {
    claims: HashMap<String, Reservation>,
    outbound: Vec<OutboundHold>,
}

/// In-memory reservation ledger over the shared treasury balance.
///
/// Concurrent settlements share one treasury account per asset, so a raw
/// balance read cannot tell whose deposit just landed, nor whether a
/// just-submitted transfer has been deducted yet. Every attempt claims
/// its expected amount here before polling, and confirmation happens
/// through [`ReservationLedger::try_confirm`] under one lock: the first
/// attempt to observe enough unclaimed balance funds its claim, and from
/// then on that amount is invisible to every other attempt. Submitted
/// transfers stay on the book as outbound holds until the inclusion lag
/// has safely passed.
pub struct ReservationLedger {
    book: Mutex<Book>,
    outbound_hold: Duration,
}

impl Default for ReservationLedger {
    fn default() -> Self {
        Self {
            book: Mutex::new(Book::default()),
            outbound_hold: OUTBOUND_HOLD,
        }
    }
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a claim for `swap_id`. Fails if the swap already holds one.
    pub fn reserve(
        &self,
        swap_id: &str,
        asset: Asset,
        amount: Decimal,
    ) -> Result<(), SettlementError> {
        let mut book = self.book.lock();

        if book.claims.contains_key(swap_id) {
            return Err(SettlementError::FundsAlreadyClaimed(swap_id.to_string()));
        }

        book.claims.insert(
            swap_id.to_string(),
            Reservation {
                swap_id: swap_id.to_string(),
                asset,
                amount,
                funded: false,
            },
        );

        info!("🔒 Reserved {} {} for swap {}", amount, asset, swap_id);
        Ok(())
    }

    /// Match the claim for `swap_id` against an observed balance,
    /// atomically: the balance is netted against other funded claims and
    /// outbound holds on the same asset, and the claim becomes funded the
    /// moment it fits. Two attempts can never fund against the same
    /// portion of the balance.
    pub fn try_confirm(&self, swap_id: &str, balance: Decimal) -> FundsCheck {
        let mut book = self.book.lock();
        Self::prune_outbound(&mut book, self.outbound_hold);

        let (asset, amount) = match book.claims.get(swap_id) {
            Some(claim) => (claim.asset, claim.amount),
            None => return FundsCheck::Insufficient,
        };

        let held: Decimal = book
            .claims
            .values()
            .filter(|r| r.asset == asset && r.funded && r.swap_id != swap_id)
            .map(|r| r.amount)
            .sum::<Decimal>()
            + book
                .outbound
                .iter()
                .filter(|o| o.asset == asset)
                .map(|o| o.amount)
                .sum::<Decimal>();

        if balance - held >= amount {
            if let Some(claim) = book.claims.get_mut(swap_id) {
                claim.funded = true;
            }
            info!("💰 Claim funded: {} {} for swap {}", amount, asset, swap_id);
            FundsCheck::Confirmed
        } else if balance >= amount {
            FundsCheck::ClaimedByOthers
        } else {
            FundsCheck::Insufficient
        }
    }

    /// Drop the claim for `swap_id` (funds never confirmed, the attempt
    /// was cancelled, or its future was abandoned)
    pub fn release(&self, swap_id: &str) -> Option<Reservation> {
        let released = self.book.lock().claims.remove(swap_id);
        if released.is_some() {
            info!("🔓 Released reservation for swap {}", swap_id);
        }
        released
    }

    /// Convert the claim into an outbound hold after the transfer was
    /// submitted. The amount keeps counting against observed balances
    /// until the hold expires, so the inclusion lag cannot be
    /// double-counted by a concurrent attempt.
    pub fn consume(&self, swap_id: &str) -> Option<Reservation> {
        let mut book = self.book.lock();
        let claim = book.claims.remove(swap_id)?;

        book.outbound.push(OutboundHold {
            asset: claim.asset,
            amount: claim.amount,
            submitted_at: Instant::now(),
        });
        Some(claim)
    }

    /// Claims currently held, for reconciliation views
    pub fn outstanding(&self, asset: Asset) -> Decimal {
        self.book
            .lock()
            .claims
            .values()
            .filter(|r| r.asset == asset)
            .map(|r| r.amount)
            .sum()
    }

    /// Submitted transfers still within their inclusion hold
    pub fn pending_outbound(&self, asset: Asset) -> Decimal {
        let mut book = self.book.lock();
        Self::prune_outbound(&mut book, self.outbound_hold);

        book.outbound
            .iter()
            .filter(|o| o.asset == asset)
            .map(|o| o.amount)
            .sum()
    }

    fn prune_outbound(book: &mut Book, hold: Duration) {
        let now = Instant::now();
        book.outbound
            .retain(|o| now.duration_since(o.submitted_at) < hold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_duplicate_swap_claim_rejected() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Usdc, dec!(100)).unwrap();

        let err = ledger.reserve("swap-1", Asset::Usdc, dec!(100)).unwrap_err();
        assert!(matches!(err, SettlementError::FundsAlreadyClaimed(id) if id == "swap-1"));
    }

    #[test]
    fn test_unfunded_claims_do_not_block_each_other() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Usdc, dec!(60)).unwrap();
        ledger.reserve("swap-2", Asset::Usdc, dec!(50)).unwrap();

        // neither claim has matched a balance yet, so 50 on hand is
        // enough for swap-2
        assert_eq!(ledger.try_confirm("swap-2", dec!(50)), FundsCheck::Confirmed);
    }

    #[test]
    fn test_first_funded_claim_wins_the_deposit() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Usdc, dec!(100)).unwrap();
        ledger.reserve("swap-2", Asset::Usdc, dec!(100)).unwrap();

        assert_eq!(ledger.try_confirm("swap-1", dec!(100)), FundsCheck::Confirmed);
        assert_eq!(
            ledger.try_confirm("swap-2", dec!(100)),
            FundsCheck::ClaimedByOthers
        );

        // a second deposit frees the loser
        assert_eq!(ledger.try_confirm("swap-2", dec!(200)), FundsCheck::Confirmed);
    }

    #[test]
    fn test_short_balance_is_insufficient_not_claimed() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Usdc, dec!(100)).unwrap();

        assert_eq!(
            ledger.try_confirm("swap-1", dec!(99.99)),
            FundsCheck::Insufficient
        );
    }

    #[test]
    fn test_funding_is_per_asset() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Usdc, dec!(100)).unwrap();
        ledger.reserve("swap-2", Asset::Dai, dec!(100)).unwrap();
        assert_eq!(ledger.try_confirm("swap-1", dec!(100)), FundsCheck::Confirmed);

        // the USDC claim does not shadow the DAI balance
        assert_eq!(ledger.try_confirm("swap-2", dec!(100)), FundsCheck::Confirmed);
    }

    #[test]
    fn test_consumed_claim_holds_as_pending_outbound() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Usdc, dec!(100)).unwrap();
        ledger.try_confirm("swap-1", dec!(100));
        ledger.consume("swap-1").unwrap();

        assert_eq!(ledger.outstanding(Asset::Usdc), dec!(0));
        assert_eq!(ledger.pending_outbound(Asset::Usdc), dec!(100));

        // the unchanged balance is still accounted for by the outbound
        // transfer, so a new claim cannot double-count it
        ledger.reserve("swap-2", Asset::Usdc, dec!(100)).unwrap();
        assert_eq!(
            ledger.try_confirm("swap-2", dec!(100)),
            FundsCheck::ClaimedByOthers
        );
    }

    #[test]
    fn test_release_frees_claim_for_reuse() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Eth, dec!(1)).unwrap();
        assert!(ledger.release("swap-1").is_some());
        assert!(ledger.release("swap-1").is_none());

        ledger.reserve("swap-1", Asset::Eth, dec!(1)).unwrap();
        assert_eq!(ledger.outstanding(Asset::Eth), dec!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_hold_expires() {
        let ledger = ReservationLedger::new();
        ledger.reserve("swap-1", Asset::Usdc, dec!(100)).unwrap();
        ledger.try_confirm("swap-1", dec!(100));
        ledger.consume("swap-1").unwrap();
        assert_eq!(ledger.pending_outbound(Asset::Usdc), dec!(100));

        tokio::time::sleep(OUTBOUND_HOLD + Duration::from_secs(1)).await;

        assert_eq!(ledger.pending_outbound(Asset::Usdc), dec!(0));
        ledger.reserve("swap-2", Asset::Usdc, dec!(100)).unwrap();
        assert_eq!(ledger.try_confirm("swap-2", dec!(100)), FundsCheck::Confirmed);
    }
}
