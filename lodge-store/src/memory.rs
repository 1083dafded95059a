//! In-process ledger with serializable transactions.
//!
//! Every transaction reads from a private snapshot and buffers its writes.
//! Reads and writes are tracked as footprints; at commit the transaction
//! is validated against everything that committed after its snapshot was
//! taken. If a later commit wrote something this transaction read, the
//! commit fails with [`StoreError::SerializationFailure`] (first committer
//! wins). Read-only transactions always commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use lodge_core::{
    CalendarError, DateRange, LedgerStore, LedgerTx, Location, Reservation, ReservationId, ReservedDate, Stay,
    StayCalendar, StayId, StoreError, StoreResult,
};

/// The part of the ledger a transaction touched
#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
    /// The stay row itself (existence, ownership, metadata)
    StayRow(StayId),
    /// A range of reserved-day slots of one stay
    Days(StayId, DateRange),
    /// Every reserved-day slot and reservation of one stay
    AllDays(StayId),
    /// One reservation row
    Reservation(StayId, ReservationId),
    /// The set of stays listed by a host
    HostStays(String),
    /// The set of reservations made by a guest
    GuestReservations(String),
}

impl Footprint {
    /// Whether a write to `self` invalidates a read of `read`.
    pub fn conflicts_with(&self, read: &Footprint) -> bool {
        use Footprint::*;

        match (self, read) {
            (StayRow(a), StayRow(b)) => a == b,
            (Days(a, r1), Days(b, r2)) => a == b && r1.overlaps(r2),
            (Days(a, _), AllDays(b))
            | (AllDays(a), Days(b, _))
            | (AllDays(a), AllDays(b))
            | (AllDays(a), Reservation(b, _))
            | (Reservation(a, _), AllDays(b)) => a == b,
            (Reservation(_, a), Reservation(_, b)) => a == b,
            (HostStays(a), HostStays(b)) => a == b,
            (GuestReservations(a), GuestReservations(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
enum WriteOp {
    InsertStay(Stay),
    SaveLocation(Location),
    SaveReservation(Reservation),
    DeleteReservation(ReservationId),
    DeleteStay(StayId),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    stays: HashMap<StayId, Stay>,
    locations: HashMap<StayId, Location>,
    reservations: HashMap<ReservationId, Reservation>,
    calendars: HashMap<StayId, StayCalendar>,
}

impl Tables {
    fn apply(&mut self, op: &WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::InsertStay(stay) => {
                if self.stays.contains_key(&stay.id) {
                    return Err(StoreError::UniqueViolation("stays_pkey".to_string()));
                }
                self.stays.insert(stay.id, stay.clone());
                self.calendars.insert(stay.id, StayCalendar::new(stay.id));
            }
            WriteOp::SaveLocation(location) => {
                if !self.stays.contains_key(&location.stay_id) {
                    return Err(StoreError::ForeignKeyViolation("locations_stay_id_fkey".to_string()));
                }
                self.locations.insert(location.stay_id, *location);
            }
            WriteOp::SaveReservation(reservation) => {
                if reservation.check_in >= reservation.check_out {
                    return Err(StoreError::Backend(format!(
                        "reservations_range_check: check-in {} is not before check-out {}",
                        reservation.check_in, reservation.check_out
                    )));
                }
                if self.reservations.contains_key(&reservation.id) {
                    return Err(StoreError::UniqueViolation("reservations_pkey".to_string()));
                }
                let calendar = self
                    .calendars
                    .get_mut(&reservation.stay_id)
                    .ok_or_else(|| StoreError::ForeignKeyViolation("reservations_stay_id_fkey".to_string()))?;
                calendar.claim(&reservation.reserved_dates()).map_err(|err| match err {
                    CalendarError::AlreadyReserved { .. } => {
                        StoreError::UniqueViolation("stay_reserved_dates_pkey".to_string())
                    }
                    other => StoreError::Backend(other.to_string()),
                })?;
                self.reservations.insert(reservation.id, reservation.clone());
            }
            WriteOp::DeleteReservation(id) => {
                if let Some(reservation) = self.reservations.remove(id) {
                    if let Some(calendar) = self.calendars.get_mut(&reservation.stay_id) {
                        calendar.release(*id);
                    }
                }
            }
            WriteOp::DeleteStay(stay_id) => {
                self.stays.remove(stay_id);
                self.locations.remove(stay_id);
                self.calendars.remove(stay_id);
                self.reservations.retain(|_, r| r.stay_id != *stay_id);
            }
        }
        Ok(())
    }
}

struct CommitRecord {
    version: u64,
    writes: Vec<Footprint>,
}

#[derive(Default)]
struct Shared {
    tables: Tables,
    version: u64,
    history: Vec<CommitRecord>,
    // snapshot version -> open transactions reading it
    active: BTreeMap<u64, usize>,
}

impl Shared {
    fn prune_history(&mut self) {
        match self.active.keys().next().copied() {
            Some(oldest) => self.history.retain(|record| record.version > oldest),
            None => self.history.clear(),
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> StoreResult<MutexGuard<'_, Shared>> {
    shared
        .lock()
        .map_err(|_| StoreError::Backend("memory ledger lock poisoned".to_string()))
}

/// In-memory [`LedgerStore`]; clones share the same data.
///
/// Every snapshot and every commit copies all tables, so each transaction
/// costs O(total data).
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed reserved-day rows of a stay, ordered by date.
    pub fn reserved_dates(&self, stay_id: StayId) -> StoreResult<Vec<ReservedDate>> {
        let shared = lock(&self.shared)?;
        Ok(shared
            .tables
            .calendars
            .get(&stay_id)
            .map(|calendar| calendar.rows().collect())
            .unwrap_or_default())
    }

    /// Number of committed reservations across all stays.
    pub fn reservation_count(&self) -> StoreResult<usize> {
        Ok(lock(&self.shared)?.tables.reservations.len())
    }

    pub fn location(&self, stay_id: StayId) -> StoreResult<Option<Location>> {
        Ok(lock(&self.shared)?.tables.locations.get(&stay_id).copied())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin_serializable(&self) -> StoreResult<MemoryLedgerTx> {
        let mut shared = lock(&self.shared)?;
        let snapshot_version = shared.version;
        *shared.active.entry(snapshot_version).or_insert(0) += 1;

        Ok(MemoryLedgerTx {
            shared: Arc::clone(&self.shared),
            snapshot_version,
            view: shared.tables.clone(),
            reads: Vec::new(),
            writes: Vec::new(),
            ops: Vec::new(),
        })
    }
}

pub struct MemoryLedgerTx {
    shared: Arc<Mutex<Shared>>,
    snapshot_version: u64,
    view: Tables,
    reads: Vec<Footprint>,
    writes: Vec<Footprint>,
    ops: Vec<WriteOp>,
}

impl MemoryLedgerTx {
    fn write(&mut self, op: WriteOp, footprints: Vec<Footprint>) -> StoreResult<()> {
        self.view.apply(&op)?;
        self.ops.push(op);
        self.writes.extend(footprints);
        Ok(())
    }
}

impl Drop for MemoryLedgerTx {
    fn drop(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            if let Some(count) = shared.active.get_mut(&self.snapshot_version) {
                *count -= 1;
                if *count == 0 {
                    shared.active.remove(&self.snapshot_version);
                }
            }
            shared.prune_history();
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn find_stay(&mut self, stay_id: StayId) -> StoreResult<Option<Stay>> {
        self.reads.push(Footprint::StayRow(stay_id));
        Ok(self.view.stays.get(&stay_id).cloned())
    }

    async fn list_stays_by_host(&mut self, host: &str) -> StoreResult<Vec<Stay>> {
        self.reads.push(Footprint::HostStays(host.to_string()));
        let mut stays: Vec<Stay> = self
            .view
            .stays
            .values()
            .filter(|stay| stay.host == host)
            .cloned()
            .collect();
        stays.sort_by_key(|stay| stay.created_at);
        Ok(stays)
    }

    async fn insert_stay(&mut self, stay: &Stay) -> StoreResult<()> {
        let footprints = vec![Footprint::StayRow(stay.id), Footprint::HostStays(stay.host.clone())];
        self.write(WriteOp::InsertStay(stay.clone()), footprints)
    }

    async fn save_location(&mut self, location: &Location) -> StoreResult<()> {
        self.write(WriteOp::SaveLocation(*location), vec![Footprint::StayRow(location.stay_id)])
    }

    async fn reserved_days_in_range(&mut self, stay_id: StayId, range: DateRange) -> StoreResult<Vec<NaiveDate>> {
        self.reads.push(Footprint::Days(stay_id, range));
        Ok(self
            .view
            .calendars
            .get(&stay_id)
            .map(|calendar| calendar.reserved_days_in_range(range))
            .unwrap_or_default())
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> StoreResult<()> {
        let footprints = vec![
            Footprint::Days(reservation.stay_id, reservation.range()),
            Footprint::Reservation(reservation.stay_id, reservation.id),
            Footprint::GuestReservations(reservation.guest.clone()),
        ];
        self.write(WriteOp::SaveReservation(reservation.clone()), footprints)
    }

    async fn find_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        let found = self.view.reservations.get(&id).cloned();
        if let Some(reservation) = &found {
            self.reads.push(Footprint::Reservation(reservation.stay_id, id));
        }
        Ok(found)
    }

    async fn find_active_reservations(&mut self, stay_id: StayId, as_of: NaiveDate) -> StoreResult<Vec<Reservation>> {
        self.reads.push(Footprint::AllDays(stay_id));
        let mut active: Vec<Reservation> = self
            .view
            .reservations
            .values()
            .filter(|r| r.stay_id == stay_id && r.is_active(as_of))
            .cloned()
            .collect();
        active.sort_by_key(|r| (r.check_in, r.created_at));
        Ok(active)
    }

    async fn list_reservations_by_guest(&mut self, guest: &str) -> StoreResult<Vec<Reservation>> {
        self.reads.push(Footprint::GuestReservations(guest.to_string()));
        let mut reservations: Vec<Reservation> = self
            .view
            .reservations
            .values()
            .filter(|r| r.guest == guest)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| (r.check_in, r.created_at));
        Ok(reservations)
    }

    async fn delete_reservation(&mut self, id: ReservationId) -> StoreResult<()> {
        let Some(reservation) = self.view.reservations.get(&id).cloned() else {
            return Ok(());
        };
        let footprints = vec![
            Footprint::Days(reservation.stay_id, reservation.range()),
            Footprint::Reservation(reservation.stay_id, id),
            Footprint::GuestReservations(reservation.guest),
        ];
        self.write(WriteOp::DeleteReservation(id), footprints)
    }

    async fn delete_stay(&mut self, stay_id: StayId) -> StoreResult<()> {
        let mut footprints = vec![Footprint::StayRow(stay_id), Footprint::AllDays(stay_id)];
        if let Some(stay) = self.view.stays.get(&stay_id) {
            footprints.push(Footprint::HostStays(stay.host.clone()));
        }
        let guests: Vec<String> = self
            .view
            .reservations
            .values()
            .filter(|r| r.stay_id == stay_id)
            .map(|r| r.guest.clone())
            .collect();
        footprints.extend(guests.into_iter().map(Footprint::GuestReservations));
        self.write(WriteOp::DeleteStay(stay_id), footprints)
    }

    async fn commit(mut self) -> StoreResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let mut shared = lock(&self.shared)?;

        let stale = shared
            .history
            .iter()
            .filter(|record| record.version > self.snapshot_version)
            .any(|record| {
                record
                    .writes
                    .iter()
                    .any(|write| self.reads.iter().any(|read| write.conflicts_with(read)))
            });
        if stale {
            debug!(snapshot = self.snapshot_version, "memory ledger rejected stale transaction");
            return Err(StoreError::SerializationFailure);
        }

        let mut next = shared.tables.clone();
        for op in &self.ops {
            next.apply(op)?;
        }

        shared.tables = next;
        shared.version += 1;
        let version = shared.version;
        shared.history.push(CommitRecord {
            version,
            writes: std::mem::take(&mut self.writes),
        });
        debug!(version, "memory ledger committed");
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}
