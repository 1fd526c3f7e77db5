pub mod booking;
pub mod branch;
pub mod event;
pub mod payment;
pub mod promotion;
pub mod room;
pub mod stats;

pub use booking::{Booking, BookingStatus};
pub use branch::{Branch, BranchSchedule};
pub use event::BookingEvent;
pub use payment::{Payment, PaymentStatus, RefundStatus};
pub use promotion::{Promotion, PromotionTarget};
pub use room::Room;
pub use stats::CancellationStats;
