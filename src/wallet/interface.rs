use std::future::Future;
use std::sync::Arc;

use bitcoin::{Amount, Txid};

use crate::error::WalletError;
use super::backend::{LedgerBackend, RpcLedgerBackend};
use super::config::WalletConfig;
use super::payload::ClaimPayload;
use super::reservation::ReservationLedger;
use super::types::{
    add_amounts, AbandonOut, ClaimOptions, ClaimOut, PaymentOut, RemoteOutcome, Reservation, Spend, SupportOut,
};

/// Reservation that goes back to the spendable balance unless it is committed.
///
/// Covers remote errors, failure outcomes and callers dropping the future mid-call.
struct PendingSpend<'a> {
    ledger: &'a ReservationLedger,
    reservation: Option<Reservation>,
}

impl<'a> PendingSpend<'a> {
    fn new(ledger: &'a ReservationLedger, reservation: Reservation) -> Self {
        Self {
            ledger,
            reservation: Some(reservation),
        }
    }

    fn commit(mut self, fee: Amount) {
        if let Some(reservation) = self.reservation.take() {
            self.ledger.commit_reservation(reservation, fee);
        }
    }
}

impl Drop for PendingSpend<'_> {
    fn drop(&mut self) {
        if let Some(reservation) = self.reservation.take() {
            log::debug!("Releasing uncommitted reservation for {}", reservation.identifier());
            self.ledger.cancel_point_reservation(reservation);
        }
    }
}

/// Sequences claim, support and abandon operations against the remote ledger
pub struct WalletInterface {
    ledger: ReservationLedger,
    backend: Arc<dyn LedgerBackend>,
}

impl WalletInterface {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            ledger: ReservationLedger::new(),
            backend,
        }
    }

    pub fn from_config(config: &WalletConfig) -> Result<Self, WalletError> {
        log::info!("Using ledger daemon at {}", config.ledger_url);
        let backend = RpcLedgerBackend::from_config(config)?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    pub fn get_balance(&self) -> Amount {
        self.ledger.get_balance()
    }

    pub fn reserve_points(&self, identifier: impl Into<String>, amount: Amount) -> Option<Reservation> {
        self.ledger.reserve_points(identifier, amount)
    }

    pub fn cancel_point_reservation(&self, reservation: Reservation) {
        self.ledger.cancel_point_reservation(reservation)
    }

    pub fn send_points_to_address(&self, reservation: Reservation, amount: Amount) -> Result<(), WalletError> {
        self.ledger.send_points_to_address(reservation, amount)
    }

    /// Re-read the confirmed balance from the ledger
    pub async fn update_balance(&self) -> Result<Amount, WalletError> {
        let balance = self.backend.fetch_balance().await?;
        self.ledger.set_balance(balance);
        Ok(balance)
    }

    /// Reserve `amount`, run the remote spend, then commit on success or release otherwise.
    async fn spend_reserved<T, F, Fut>(
        &self,
        operation: &str,
        identifier: &str,
        amount: Amount,
        attempt: F,
    ) -> Result<T, WalletError>
    where
        T: Spend,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RemoteOutcome<T>, WalletError>>,
    {
        let reservation = self.ledger.reserve_points(identifier, amount).ok_or_else(|| {
            WalletError::InsufficientFunds {
                requested: amount,
                available: self.ledger.get_balance(),
            }
        })?;
        let pending = PendingSpend::new(&self.ledger, reservation);

        let outcome = match attempt().await {
            Ok(outcome) => outcome,
            Err(e) if e.is_malformed_success() => {
                log::error!("{} for {} went through but returned a bad result: {}", operation, identifier, e);
                pending.commit(Amount::ZERO);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        match outcome {
            RemoteOutcome::Success(out) => {
                pending.commit(out.fee());
                Ok(out)
            }
            RemoteOutcome::Failure { reason } => {
                log::error!("{} for {} failed: {}", operation, identifier, reason);
                Err(WalletError::remote_failure(operation, reason))
            }
        }
    }

    pub async fn claim_name(
        &self,
        name: &str,
        bid: Amount,
        payload: &ClaimPayload,
        options: &ClaimOptions,
    ) -> Result<ClaimOut, WalletError> {
        log::info!("Claiming name {} with a bid of {}", name, bid);
        let claim = self
            .spend_reserved("Claim to name", name, bid, || {
                self.backend.claim_name(name, bid, payload, options)
            })
            .await?;
        log::info!("Claimed {} at {}", name, claim.outpoint());
        Ok(claim)
    }

    pub async fn support_claim(&self, name: &str, claim_id: &str, amount: Amount) -> Result<SupportOut, WalletError> {
        log::info!("Supporting claim {} on {} with {}", claim_id, name, amount);
        self.spend_reserved("Support", name, amount, || {
            self.backend.support_claim(name, claim_id, amount)
        })
        .await
    }

    /// Abandoning frees funds, so nothing is reserved up front
    pub async fn abandon_claim(
        &self,
        claim_id: &str,
        txid: Option<Txid>,
        nout: Option<u32>,
    ) -> Result<AbandonOut, WalletError> {
        log::info!("Abandoning claim {}", claim_id);
        let outcome = self.backend.abandon_claim(claim_id, txid, nout).await?;
        outcome.into_result("Abandon").map_err(|e| {
            log::error!("Abandon of {} failed: {}", claim_id, e);
            e
        })
    }

    /// Pay out everything queued by `send_points_to_address` in one transaction.
    ///
    /// Returns `None` when the queue is empty. On any failure the payments go back
    /// on the queue and stay held against the balance.
    pub async fn send_queued_payments(&self) -> Result<Option<PaymentOut>, WalletError> {
        let payments = self.ledger.take_queued_payments();
        if payments.is_empty() {
            return Ok(None);
        }

        let total = payments.values().fold(Amount::ZERO, |sum, amount| add_amounts(sum, *amount));
        log::info!("Sending {} to {} addresses", total, payments.len());

        let outcome = match self.backend.send_to_many(&payments).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_malformed_success() => {
                log::error!("Queued payments were sent but the result was unreadable: {}", e);
                self.ledger.record_spend(total);
                return Err(e);
            }
            Err(e) => {
                log::error!("Failed to send queued payments: {}", e);
                self.ledger.requeue_payments(payments);
                return Err(e);
            }
        };

        match outcome {
            RemoteOutcome::Success(out) => {
                self.ledger.record_spend(add_amounts(total, out.fee));
                Ok(Some(out))
            }
            RemoteOutcome::Failure { reason } => {
                log::error!("Queued payments were rejected: {}", reason);
                self.ledger.requeue_payments(payments);
                Err(WalletError::remote_failure("Payment", reason))
            }
        }
    }
}
