#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Barrier;

use lodge_core::identity::Principal;
use lodge_core::{
    DateRange, FixedClock, LedgerStore, LedgerTx, Location, NewStay, Reservation, ReservationId, Stay,
    StayId, StoreError, StoreResult,
};
use lodge_booking::BookingRequest;
use lodge_store::memory::{MemoryLedgerStore, MemoryLedgerTx};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn request(stay_id: StayId, check_in: &str, check_out: &str) -> BookingRequest {
    BookingRequest {
        stay_id,
        check_in: Some(date(check_in)),
        check_out: Some(date(check_out)),
    }
}

pub fn clock_at(day: &str) -> Arc<FixedClock> {
    Arc::new(FixedClock::at_date(date(day)))
}

pub fn listing(name: &str) -> NewStay {
    NewStay {
        name: name.to_string(),
        description: None,
        address: "12 Harbor Way".to_string(),
        guest_number: 2,
    }
}

/// Insert a stay owned by `host` directly through the ledger.
pub async fn seed_stay<S: LedgerStore>(store: &S, host: &str) -> StayId {
    let stay = Stay::new(host.to_string(), listing("Seaside flat"), Utc::now());
    let mut tx = store.begin_serializable().await.unwrap();
    tx.insert_stay(&stay).await.unwrap();
    tx.commit().await.unwrap();
    stay.id
}

/// Insert a reservation directly, bypassing admission control.
pub async fn seed_reservation<S: LedgerStore>(store: &S, stay_id: StayId, check_in: &str, check_out: &str) -> Reservation {
    let range = DateRange::new(date(check_in), date(check_out)).unwrap();
    let reservation = Reservation::new(stay_id, "seeded-guest".to_string(), range, Utc::now());
    let mut tx = store.begin_serializable().await.unwrap();
    tx.save_reservation(&reservation).await.unwrap();
    tx.commit().await.unwrap();
    reservation
}

pub fn host() -> Principal {
    Principal::host("hana")
}

pub fn guest(name: &str) -> Principal {
    Principal::guest(name)
}

/// Holds every transaction at its commit point until `parties` of them
/// have arrived, so all of them read before any of them writes.
#[derive(Clone)]
pub struct RendezvousStore {
    pub inner: MemoryLedgerStore,
    barrier: Arc<Barrier>,
    save_fault: Option<fn() -> StoreError>,
}

impl RendezvousStore {
    pub fn new(inner: MemoryLedgerStore, parties: usize) -> Self {
        Self {
            inner,
            barrier: Arc::new(Barrier::new(parties)),
            save_fault: None,
        }
    }

    /// A store whose `save_reservation` always fails with `fault()`.
    pub fn failing_saves(inner: MemoryLedgerStore, fault: fn() -> StoreError) -> Self {
        Self {
            save_fault: Some(fault),
            ..Self::new(inner, 1)
        }
    }
}

#[async_trait]
impl LedgerStore for RendezvousStore {
    type Tx = RendezvousTx;

    async fn begin_serializable(&self) -> StoreResult<RendezvousTx> {
        Ok(RendezvousTx {
            inner: self.inner.begin_serializable().await?,
            barrier: Arc::clone(&self.barrier),
            save_fault: self.save_fault,
        })
    }
}

pub struct RendezvousTx {
    inner: MemoryLedgerTx,
    barrier: Arc<Barrier>,
    save_fault: Option<fn() -> StoreError>,
}

#[async_trait]
impl LedgerTx for RendezvousTx {
    async fn find_stay(&mut self, stay_id: StayId) -> StoreResult<Option<Stay>> {
        self.inner.find_stay(stay_id).await
    }

    async fn list_stays_by_host(&mut self, host: &str) -> StoreResult<Vec<Stay>> {
        self.inner.list_stays_by_host(host).await
    }

    async fn insert_stay(&mut self, stay: &Stay) -> StoreResult<()> {
        self.inner.insert_stay(stay).await
    }

    async fn save_location(&mut self, location: &Location) -> StoreResult<()> {
        self.inner.save_location(location).await
    }

    async fn reserved_days_in_range(&mut self, stay_id: StayId, range: DateRange) -> StoreResult<Vec<NaiveDate>> {
        self.inner.reserved_days_in_range(stay_id, range).await
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> StoreResult<()> {
        if let Some(fault) = self.save_fault {
            return Err(fault());
        }
        self.inner.save_reservation(reservation).await
    }

    async fn find_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        self.inner.find_reservation(id).await
    }

    async fn find_active_reservations(&mut self, stay_id: StayId, as_of: NaiveDate) -> StoreResult<Vec<Reservation>> {
        self.inner.find_active_reservations(stay_id, as_of).await
    }

    async fn list_reservations_by_guest(&mut self, guest: &str) -> StoreResult<Vec<Reservation>> {
        self.inner.list_reservations_by_guest(guest).await
    }

    async fn delete_reservation(&mut self, id: ReservationId) -> StoreResult<()> {
        self.inner.delete_reservation(id).await
    }

    async fn delete_stay(&mut self, stay_id: StayId) -> StoreResult<()> {
        self.inner.delete_stay(stay_id).await
    }

    async fn commit(self) -> StoreResult<()> {
        self.barrier.wait().await;
        self.inner.commit().await
    }

    async fn rollback(self) -> StoreResult<()> {
        self.inner.rollback().await
    }
}
