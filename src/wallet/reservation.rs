//! In-memory accounting of spendable balance against funds held for in-flight operations

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bitcoin::Amount;

use super::types::{add_amounts, Reservation};
use crate::error::WalletError;

#[derive(Debug, Default)]
struct LedgerState {
    /// Confirmed balance as last read from the remote ledger
    balance: Amount,
    total_reserved: Amount,
    queued_payments: HashMap<String, Amount>,
    /// Committed spends the next balance refresh is expected to reflect
    spent_since_refresh: Amount,
}

impl LedgerState {
    fn queued_total(&self) -> Amount {
        self.queued_payments
            .values()
            .fold(Amount::ZERO, |total, amount| add_amounts(total, *amount))
    }

    fn spendable(&self) -> Amount {
        let held = add_amounts(
            add_amounts(self.total_reserved, self.queued_total()),
            self.spent_since_refresh,
        );
        self.balance.checked_sub(held).unwrap_or(Amount::ZERO)
    }

    fn release(&mut self, amount: Amount) {
        self.total_reserved = self.total_reserved.checked_sub(amount).unwrap_or_else(|| {
            log::warn!(
                "Released {} with only {} reserved; clamping to zero",
                amount,
                self.total_reserved
            );
            Amount::ZERO
        });
    }
}

/// Tracks the confirmed balance and everything held against it.
///
/// Every mutation takes the write lock for one short critical section, so the
/// balance check and the reservation update in `reserve_points` cannot interleave
/// with another reservation. Readers only take the read lock.
#[derive(Debug, Default)]
pub struct ReservationLedger {
    state: RwLock<LedgerState>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(balance: Amount) -> Self {
        let ledger = Self::new();
        ledger.set_balance(balance);
        ledger
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Confirmed balance minus reservations, queued payments and unconfirmed spends
    pub fn get_balance(&self) -> Amount {
        self.read().spendable()
    }

    pub fn confirmed_balance(&self) -> Amount {
        self.read().balance
    }

    pub fn total_reserved_points(&self) -> Amount {
        self.read().total_reserved
    }

    pub fn queued_payments(&self) -> HashMap<String, Amount> {
        self.read().queued_payments.clone()
    }

    /// Install a freshly fetched confirmed balance
    pub fn set_balance(&self, balance: Amount) {
        let mut state = self.write();
        log::debug!(
            "Balance refreshed: {} -> {} ({} spent since last refresh)",
            state.balance,
            balance,
            state.spent_since_refresh
        );
        state.balance = balance;
        state.spent_since_refresh = Amount::ZERO;
    }

    /// Hold `amount` for `identifier`, or `None` when it exceeds the spendable balance
    pub fn reserve_points(&self, identifier: impl Into<String>, amount: Amount) -> Option<Reservation> {
        let identifier = identifier.into();
        let mut state = self.write();
        let spendable = state.spendable();
        if amount > spendable {
            log::info!(
                "Cannot reserve {} for {}: only {} spendable",
                amount,
                identifier,
                spendable
            );
            return None;
        }
        state.total_reserved = add_amounts(state.total_reserved, amount);
        log::debug!("Reserved {} for {}", amount, identifier);
        Some(Reservation::new(identifier, amount))
    }

    /// Return the held funds to the spendable balance
    pub fn cancel_point_reservation(&self, reservation: Reservation) {
        log::debug!(
            "Cancelling reservation of {} for {}",
            reservation.amount(),
            reservation.identifier()
        );
        self.write().release(reservation.amount());
    }

    /// Queue `amount` for the reservation's identifier and drop the hold.
    ///
    /// Any part of the reservation above `amount` becomes spendable again. Sending
    /// more than was reserved releases the reservation and fails.
    pub fn send_points_to_address(&self, reservation: Reservation, amount: Amount) -> Result<(), WalletError> {
        let mut state = self.write();
        state.release(reservation.amount());

        if amount > reservation.amount() {
            log::warn!(
                "Refusing to send {} to {} against a reservation of {}",
                amount,
                reservation.identifier(),
                reservation.amount()
            );
            return Err(WalletError::ValidationError(format!(
                "Cannot send {} against a reservation of {}",
                amount,
                reservation.amount()
            )));
        }

        log::debug!("Ordering that {} be sent to {}", amount, reservation.identifier());
        let queued = state
            .queued_payments
            .entry(reservation.identifier().to_string())
            .or_insert(Amount::ZERO);
        *queued = add_amounts(*queued, amount);
        Ok(())
    }

    /// Settle a reservation whose remote spend succeeded
    pub(crate) fn commit_reservation(&self, reservation: Reservation, fee: Amount) {
        let mut state = self.write();
        state.release(reservation.amount());
        state.spent_since_refresh = add_amounts(state.spent_since_refresh, add_amounts(reservation.amount(), fee));
        log::debug!(
            "Committed {} (+{} fee) for {}",
            reservation.amount(),
            fee,
            reservation.identifier()
        );
    }

    /// Drain the payment queue for settlement
    pub(crate) fn take_queued_payments(&self) -> HashMap<String, Amount> {
        std::mem::take(&mut self.write().queued_payments)
    }

    /// Put payments back after a failed settlement attempt
    pub(crate) fn requeue_payments(&self, payments: HashMap<String, Amount>) {
        let mut state = self.write();
        for (address, amount) in payments {
            let queued = state.queued_payments.entry(address).or_insert(Amount::ZERO);
            *queued = add_amounts(*queued, amount);
        }
    }

    /// Record a settled payout until the next balance refresh shows it
    pub(crate) fn record_spend(&self, amount: Amount) {
        let mut state = self.write();
        state.spent_since_refresh = add_amounts(state.spent_since_refresh, amount);
    }
}
