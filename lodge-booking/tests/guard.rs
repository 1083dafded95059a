mod common;

use std::sync::Arc;
use std::time::Duration;

use lodge_booking::{BookingError, BookingManager, StayGuard};
use lodge_core::identity::Principal;
use lodge_core::{LedgerStore, LedgerTx, StayId};
use lodge_store::MemoryLedgerStore;

use common::*;

async fn stay_exists(store: &MemoryLedgerStore, stay_id: StayId) -> bool {
    let mut tx = store.begin_serializable().await.unwrap();
    tx.find_stay(stay_id).await.unwrap().is_some()
}

#[tokio::test]
async fn test_checkout_tomorrow_blocks_delete() {
    let store = Arc::new(MemoryLedgerStore::new());
    let stay_id = seed_stay(store.as_ref(), "hana").await;
    seed_reservation(store.as_ref(), stay_id, "2024-06-01", "2024-06-11").await;
    let guard = StayGuard::new(Arc::clone(&store), clock_at("2024-06-10"));

    let result = guard.delete(stay_id, &host()).await;
    assert!(matches!(result, Err(BookingError::ActiveReservationExists(id)) if id == stay_id));
    assert!(stay_exists(&store, stay_id).await);
    assert_eq!(store.reserved_dates(stay_id).unwrap().len(), 10);
}

#[tokio::test]
async fn test_checkout_yesterday_allows_delete() {
    let store = Arc::new(MemoryLedgerStore::new());
    let stay_id = seed_stay(store.as_ref(), "hana").await;
    seed_reservation(store.as_ref(), stay_id, "2024-06-01", "2024-06-09").await;
    let guard = StayGuard::new(Arc::clone(&store), clock_at("2024-06-10"));

    guard.delete(stay_id, &host()).await.unwrap();

    assert!(!stay_exists(&store, stay_id).await);
    assert!(store.reserved_dates(stay_id).unwrap().is_empty());
    assert_eq!(store.reservation_count().unwrap(), 0);
}

#[tokio::test]
async fn test_checkout_today_is_no_longer_active() {
    let store = Arc::new(MemoryLedgerStore::new());
    let stay_id = seed_stay(store.as_ref(), "hana").await;
    seed_reservation(store.as_ref(), stay_id, "2024-06-01", "2024-06-10").await;
    let guard = StayGuard::new(Arc::clone(&store), clock_at("2024-06-10"));

    guard.delete(stay_id, &host()).await.unwrap();
    assert!(!stay_exists(&store, stay_id).await);
}

#[tokio::test]
async fn test_delete_scenario_as_time_passes() {
    let store = Arc::new(MemoryLedgerStore::new());
    let stay_id = seed_stay(store.as_ref(), "hana").await;
    let clock = clock_at("2024-05-20");
    let bookings = BookingManager::new(Arc::clone(&store), clock.clone());
    let guard = StayGuard::new(Arc::clone(&store), clock.clone());

    bookings
        .book(&guest("ana"), request(stay_id, "2024-06-01", "2024-06-05"))
        .await
        .unwrap();

    let blocked = guard.delete(stay_id, &host()).await;
    assert!(matches!(blocked, Err(BookingError::ActiveReservationExists(_))));

    // Still blocked while the guest is in the stay
    clock.set_date(date("2024-06-04"));
    let blocked = guard.delete(stay_id, &host()).await;
    assert!(matches!(blocked, Err(BookingError::ActiveReservationExists(_))));

    clock.set_date(date("2024-06-06"));
    guard.delete(stay_id, &host()).await.unwrap();
    assert!(store.reserved_dates(stay_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_requires_owner() {
    let store = Arc::new(MemoryLedgerStore::new());
    let stay_id = seed_stay(store.as_ref(), "hana").await;
    let guard = StayGuard::new(Arc::clone(&store), clock_at("2024-06-10"));

    let result = guard.delete(stay_id, &Principal::host("mallory")).await;
    assert!(matches!(result, Err(BookingError::NotFound(_))));
    assert!(stay_exists(&store, stay_id).await);

    let missing = guard.delete(StayId::new(), &host()).await;
    assert!(matches!(missing, Err(BookingError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_racing_booking_leaves_no_orphan() {
    let memory = MemoryLedgerStore::new();
    let stay_id = seed_stay(&memory, "hana").await;
    let store = Arc::new(RendezvousStore::new(memory.clone(), 2));
    let clock = clock_at("2024-05-20");
    let bookings = BookingManager::new(Arc::clone(&store), clock.clone());
    let guard = StayGuard::new(Arc::clone(&store), clock.clone());

    let ana = guest("ana");
    let owner = host();
    let (booked, deleted) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            bookings.book(&ana, request(stay_id, "2024-06-01", "2024-06-05")),
            guard.delete(stay_id, &owner),
        )
    })
    .await
    .expect("transactions did not rendezvous");

    // Exactly one side commits; the other is rejected, never both
    match (booked, deleted) {
        (Ok(_), Err(err)) => {
            assert!(matches!(err, BookingError::ActiveReservationExists(_)));
            assert!(stay_exists(&memory, stay_id).await);
            assert_eq!(memory.reservation_count().unwrap(), 1);
        }
        (Err(err), Ok(())) => {
            assert!(matches!(err, BookingError::DateRangeConflict { .. }));
            assert!(!stay_exists(&memory, stay_id).await);
            assert_eq!(memory.reservation_count().unwrap(), 0);
        }
        (booked, deleted) => panic!("unexpected outcome: {:?} / {:?}", booked, deleted),
    }
}
