use std::sync::Arc;

use tracing::{info, warn};

use lodge_core::identity::Principal;
use lodge_core::{Clock, LedgerStore, LedgerTx, Reservation, StayId, StoreError, StoreResult};

use crate::error::{BookingError, BookingResult};

enum Removal {
    Deleted,
    Missing,
    Blocked(Vec<Reservation>),
}

/// Gates stay deletion on the absence of live reservations.
///
/// The ownership check, the active-reservation query and the delete run in
/// one serializable transaction, so a reservation committed concurrently
/// either blocks the delete or is itself rejected.
pub struct StayGuard<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> Clone for StayGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: LedgerStore> StayGuard<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn delete(&self, stay_id: StayId, requester: &Principal) -> BookingResult<()> {
        match self.remove(stay_id, requester).await {
            Ok(Removal::Deleted) => {
                info!("Stay {} deleted by {}", stay_id, requester.username);
                Ok(())
            }
            Ok(Removal::Missing) => Err(BookingError::NotFound(format!("Stay {} doesn't exist", stay_id))),
            Ok(Removal::Blocked(active)) => {
                warn!(
                    "Delete of stay {} blocked by {} active reservation(s), next check-out {}",
                    stay_id,
                    active.len(),
                    active[0].check_out
                );
                Err(BookingError::ActiveReservationExists(stay_id))
            }
            Err(StoreError::SerializationFailure) => {
                warn!("Delete of stay {} aborted by a concurrent reservation", stay_id);
                Err(BookingError::ActiveReservationExists(stay_id))
            }
            Err(err) => Err(BookingError::Store(err)),
        }
    }

    async fn remove(&self, stay_id: StayId, requester: &Principal) -> StoreResult<Removal> {
        let mut tx = self.store.begin_serializable().await?;

        match tx.find_stay(stay_id).await? {
            Some(stay) if stay.is_owned_by(&requester.username) => {}
            _ => return Ok(Removal::Missing),
        }

        let active = tx.find_active_reservations(stay_id, self.clock.today()).await?;
        if !active.is_empty() {
            return Ok(Removal::Blocked(active));
        }

        tx.delete_stay(stay_id).await?;
        tx.commit().await?;
        Ok(Removal::Deleted)
    }
}
