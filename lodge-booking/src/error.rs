use chrono::NaiveDate;
use lodge_core::{CalendarError, StayId, StoreError};

/// Outcomes a caller of the booking core can observe.
///
/// None of them is retried internally: a conflict means the caller has
/// to pick another range or wait.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stay {stay_id} is not available from {check_in} to {check_out}")]
    DateRangeConflict {
        stay_id: StayId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("Cannot delete stay {0} with active reservation")]
    ActiveReservationExists(StayId),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Listing collaborator failed: {0}")]
    Collaborator(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CalendarError> for BookingError {
    fn from(err: CalendarError) -> Self {
        BookingError::InvalidRange(err.to_string())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
