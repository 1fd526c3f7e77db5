pub mod abuse;
pub mod cleanup;
pub mod clock;
pub mod hours;
pub mod lifecycle;
pub mod overlap;
pub mod payment;
pub mod pricing;
pub mod refund;
