use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::DateRange;

/// Identifier of a listed stay
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StayId(pub Uuid);

impl StayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StayId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A rentable unit listed by exactly one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stay {
    pub id: StayId,
    pub host: String,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub guest_number: i32,
    pub images: Vec<StayImage>,
    pub created_at: DateTime<Utc>,
}

impl Stay {
    pub fn new(host: String, listing: NewStay, created_at: DateTime<Utc>) -> Self {
        Self {
            id: StayId::new(),
            host,
            name: listing.name,
            description: listing.description,
            address: listing.address,
            guest_number: listing.guest_number,
            images: Vec::new(),
            created_at,
        }
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.host == username
    }
}

/// Listing metadata supplied by a host when creating a stay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStay {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub address: String,
    #[serde(default = "default_guest_number")]
    pub guest_number: i32,
}

fn default_guest_number() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayImage {
    pub url: String,
}

/// Geocoded coordinates of a stay's address
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub stay_id: StayId,
    pub lat: f64,
    pub lon: f64,
}

/// A guest's booking of a stay for the nights in [check_in, check_out)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub stay_id: StayId,
    pub guest: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(stay_id: StayId, guest: String, range: DateRange, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ReservationId::new(),
            stay_id,
            guest,
            check_in: range.start(),
            check_out: range.end(),
            created_at,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::from_stored(self.check_in, self.check_out)
    }

    /// A reservation stays active until its checkout day has arrived.
    pub fn is_active(&self, as_of: NaiveDate) -> bool {
        self.check_out > as_of
    }

    /// One reserved-day row per night of the reservation.
    pub fn reserved_dates(&self) -> Vec<ReservedDate> {
        self.range()
            .days()
            .map(|date| ReservedDate {
                stay_id: self.stay_id,
                date,
                reservation_id: self.id,
            })
            .collect()
    }
}

/// One night of a stay marked unavailable; unique per (stay, date)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservedDate {
    pub stay_id: StayId,
    pub date: NaiveDate,
    pub reservation_id: ReservationId,
}
