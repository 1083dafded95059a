pub mod error;
pub mod manager;
pub mod guard;
pub mod stays;

pub use error::{BookingError, BookingResult};
pub use manager::{BookingManager, BookingRequest};
pub use guard::StayGuard;
pub use stays::StayService;
