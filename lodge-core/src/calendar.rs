//! Day-granular availability of a stay.
//!
//! A stay's timeline is a set of reserved nights rather than a list of
//! intervals, so detecting an overlap is a set-membership test on the
//! requested nights.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Reservation, ReservationId, ReservedDate, StayId};

/// Half-open range of nights `[start, end)`; always non-empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawRange> for DateRange {
    type Error = CalendarError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CalendarError> {
        if start >= end {
            return Err(CalendarError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build a range from optional inputs, rejecting a missing bound.
    pub fn from_options(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, CalendarError> {
        let start = start.ok_or(CalendarError::MissingDate("check_in"))?;
        let end = end.ok_or(CalendarError::MissingDate("check_out"))?;
        Self::new(start, end)
    }

    // Rows read back from storage already satisfy start < end (table CHECK).
    pub(crate) fn from_stored(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day < end)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Reserved nights of one stay, keyed by date
#[derive(Debug, Clone)]
pub struct StayCalendar {
    stay_id: StayId,
    days: BTreeMap<NaiveDate, ReservationId>,
}

impl StayCalendar {
    pub fn new(stay_id: StayId) -> Self {
        Self {
            stay_id,
            days: BTreeMap::new(),
        }
    }

    /// Nights in `range` that are already reserved. Non-empty means conflict.
    pub fn reserved_days_in_range(&self, range: DateRange) -> Vec<NaiveDate> {
        self.days
            .range(range.start()..range.end())
            .map(|(day, _)| *day)
            .collect()
    }

    /// Claim every night of the reservation. Nothing is claimed if any
    /// night is already taken.
    pub fn mark_reserved(&mut self, reservation: &Reservation) -> Result<Vec<ReservedDate>, CalendarError> {
        if reservation.stay_id != self.stay_id {
            return Err(CalendarError::WrongStay {
                expected: self.stay_id,
                actual: reservation.stay_id,
            });
        }

        let rows = reservation.reserved_dates();
        self.claim(&rows)?;
        Ok(rows)
    }

    /// Insert reserved-day rows, all or nothing.
    pub fn claim(&mut self, rows: &[ReservedDate]) -> Result<(), CalendarError> {
        if let Some(row) = rows.iter().find(|row| row.stay_id != self.stay_id) {
            return Err(CalendarError::WrongStay {
                expected: self.stay_id,
                actual: row.stay_id,
            });
        }

        let mut seen = BTreeSet::new();
        if let Some(taken) = rows
            .iter()
            .find(|row| self.days.contains_key(&row.date) || !seen.insert(row.date))
        {
            return Err(CalendarError::AlreadyReserved {
                stay_id: self.stay_id,
                date: taken.date,
            });
        }

        for row in rows {
            self.days.insert(row.date, row.reservation_id);
        }
        Ok(())
    }

    /// Release the nights held by a reservation, returning how many were freed.
    pub fn release(&mut self, reservation_id: ReservationId) -> usize {
        let before = self.days.len();
        self.days.retain(|_, owner| *owner != reservation_id);
        before - self.days.len()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = ReservedDate> + '_ {
        self.days.iter().map(move |(date, reservation_id)| ReservedDate {
            stay_id: self.stay_id,
            date: *date,
            reservation_id: *reservation_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("Invalid date range: check-in {start} must be before check-out {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Missing {0} date")]
    MissingDate(&'static str),

    #[error("Stay {stay_id} is already reserved on {date}")]
    AlreadyReserved { stay_id: StayId, date: NaiveDate },

    #[error("Reservation for stay {actual} applied to calendar of stay {expected}")]
    WrongStay { expected: StayId, actual: StayId },
}
