pub mod models;
pub mod calendar;
pub mod repository;
pub mod clock;
pub mod identity;
pub mod media;
pub mod geocoding;

pub use calendar::{CalendarError, DateRange, StayCalendar};
pub use clock::{Clock, FixedClock, SystemClock};
pub use models::{Location, NewStay, Reservation, ReservationId, ReservedDate, Stay, StayId, StayImage};
pub use repository::{LedgerStore, LedgerTx, StoreError, StoreResult};
