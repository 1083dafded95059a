use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lodge_core::identity::Principal;
use lodge_core::{Clock, DateRange, LedgerStore, LedgerTx, Reservation, ReservationId, StayId, StoreError, StoreResult};

use crate::error::{BookingError, BookingResult};

/// A booking attempt as handed over by the controller layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub stay_id: StayId,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
}

enum Admission {
    Admitted(Reservation),
    StayMissing,
    Taken(Vec<NaiveDate>),
}

enum Cancellation {
    Released(Reservation, usize),
    Missing,
    AlreadyStarted(Reservation),
}

/// Admission control for reservations.
///
/// Each booking runs as one serializable transaction: look for reserved
/// nights in the requested range, and if there are none, write the
/// reservation with one reserved-day row per night. Concurrent attempts
/// on overlapping ranges are arbitrated by the store; the loser's abort
/// is reported as a [`BookingError::DateRangeConflict`].
pub struct BookingManager<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> Clone for BookingManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: LedgerStore> BookingManager<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reserve `[check_in, check_out)` of a stay for the guest.
    pub async fn book(&self, guest: &Principal, request: BookingRequest) -> BookingResult<Reservation> {
        // Rejected before any transaction is opened
        let range = DateRange::from_options(request.check_in, request.check_out)?;
        let stay_id = request.stay_id;
        let conflict = || BookingError::DateRangeConflict {
            stay_id,
            check_in: range.start(),
            check_out: range.end(),
        };

        match self.admit(guest, stay_id, range).await {
            Ok(Admission::Admitted(reservation)) => {
                info!(
                    "Reservation {} confirmed for stay {} ({} to {})",
                    reservation.id, stay_id, reservation.check_in, reservation.check_out
                );
                Ok(reservation)
            }
            Ok(Admission::StayMissing) | Err(StoreError::ForeignKeyViolation(_)) => {
                Err(BookingError::NotFound(format!("Stay {} doesn't exist", stay_id)))
            }
            Ok(Admission::Taken(days)) => {
                warn!(
                    "Booking rejected for stay {}: {} night(s) already reserved, first {}",
                    stay_id,
                    days.len(),
                    days[0]
                );
                Err(conflict())
            }
            Err(err) if err.is_contention() => {
                warn!("Booking rejected for stay {}: store aborted the transaction ({})", stay_id, err);
                Err(conflict())
            }
            Err(err) => Err(BookingError::Store(err)),
        }
    }

    async fn admit(&self, guest: &Principal, stay_id: StayId, range: DateRange) -> StoreResult<Admission> {
        let mut tx = self.store.begin_serializable().await?;

        if tx.find_stay(stay_id).await?.is_none() {
            return Ok(Admission::StayMissing);
        }

        let taken = tx.reserved_days_in_range(stay_id, range).await?;
        if !taken.is_empty() {
            return Ok(Admission::Taken(taken));
        }

        let reservation = Reservation::new(stay_id, guest.username.clone(), range, self.clock.now());
        tx.save_reservation(&reservation).await?;
        tx.commit().await?;

        Ok(Admission::Admitted(reservation))
    }

    /// Cancel a reservation that has not started yet, releasing its nights.
    pub async fn cancel(&self, reservation_id: ReservationId, guest: &Principal) -> BookingResult<()> {
        let not_found = || BookingError::NotFound(format!("Reservation {} doesn't exist", reservation_id));

        match self.release(reservation_id, guest).await {
            Ok(Cancellation::Released(reservation, nights)) => {
                info!(
                    "Reservation {} cancelled, released {} night(s) of stay {}",
                    reservation.id, nights, reservation.stay_id
                );
                Ok(())
            }
            Ok(Cancellation::Missing) => Err(not_found()),
            Ok(Cancellation::AlreadyStarted(reservation)) => Err(BookingError::InvalidRange(format!(
                "reservation {} started on {} and can no longer be cancelled",
                reservation.id, reservation.check_in
            ))),
            // The reservation or its stay was removed by a concurrent writer
            Err(StoreError::SerializationFailure) => Err(not_found()),
            Err(err) => Err(BookingError::Store(err)),
        }
    }

    async fn release(&self, reservation_id: ReservationId, guest: &Principal) -> StoreResult<Cancellation> {
        let mut tx = self.store.begin_serializable().await?;

        let reservation = match tx.find_reservation(reservation_id).await? {
            Some(r) if r.guest == guest.username => r,
            _ => return Ok(Cancellation::Missing),
        };

        if reservation.check_in <= self.clock.today() {
            return Ok(Cancellation::AlreadyStarted(reservation));
        }

        let nights = reservation.range().nights() as usize;
        tx.delete_reservation(reservation_id).await?;
        tx.commit().await?;

        Ok(Cancellation::Released(reservation, nights))
    }

    /// Reservations made by the guest, ordered by check-in.
    pub async fn list_for_guest(&self, guest: &Principal) -> BookingResult<Vec<Reservation>> {
        let mut tx = self.store.begin_serializable().await?;
        let reservations = tx.list_reservations_by_guest(&guest.username).await?;
        tx.commit().await?;
        Ok(reservations)
    }
}
