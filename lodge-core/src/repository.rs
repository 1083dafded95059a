use async_trait::async_trait;
use chrono::NaiveDate;

use crate::calendar::DateRange;
use crate::models::{Location, Reservation, ReservationId, Stay, StayId};

/// Storage engine holding stays, reservations and reserved-day rows.
///
/// The only hard requirement on an engine is serializable isolation for
/// transactions opened with [`LedgerStore::begin_serializable`] and a
/// uniqueness constraint on the (stay, date) key of reserved days.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Tx: LedgerTx;

    async fn begin_serializable(&self) -> StoreResult<Self::Tx>;
}

/// A serializable transaction over the ledger.
///
/// Dropping a transaction without calling [`LedgerTx::commit`] rolls it back.
#[async_trait]
pub trait LedgerTx: Send {
    async fn find_stay(&mut self, stay_id: StayId) -> StoreResult<Option<Stay>>;

    async fn list_stays_by_host(&mut self, host: &str) -> StoreResult<Vec<Stay>>;

    async fn insert_stay(&mut self, stay: &Stay) -> StoreResult<()>;

    async fn save_location(&mut self, location: &Location) -> StoreResult<()>;

    /// Nights in `range` already reserved for the stay.
    async fn reserved_days_in_range(&mut self, stay_id: StayId, range: DateRange) -> StoreResult<Vec<NaiveDate>>;

    /// Persist a reservation together with one reserved-day row per night
    /// of its range. The rows are derived from the reservation itself.
    async fn save_reservation(&mut self, reservation: &Reservation) -> StoreResult<()>;

    async fn find_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>>;

    /// Reservations of the stay whose check-out is strictly after `as_of`,
    /// ordered by check-in.
    async fn find_active_reservations(&mut self, stay_id: StayId, as_of: NaiveDate) -> StoreResult<Vec<Reservation>>;

    async fn list_reservations_by_guest(&mut self, guest: &str) -> StoreResult<Vec<Reservation>>;

    /// Remove a reservation and the reserved days it holds.
    async fn delete_reservation(&mut self, id: ReservationId) -> StoreResult<()>;

    /// Remove a stay along with everything it owns.
    async fn delete_stay(&mut self, stay_id: StayId) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Transaction aborted by the store to preserve serializability")]
    SerializationFailure,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// The store rejected the transaction because of a concurrent writer
    /// or a duplicate key, as opposed to an infrastructure failure.
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::SerializationFailure | StoreError::UniqueViolation(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
