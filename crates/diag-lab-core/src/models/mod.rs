//! Domain models for the diagnostic lab core.

mod actor;
mod catalog;
mod doctor;
mod invoice;
mod report;

pub use actor::*;
pub use catalog::*;
pub use doctor::*;
pub use invoice::*;
pub use report::*;

/// Monetary amount. Stored as canonical decimal text.
pub type Money = rust_decimal::Decimal;
