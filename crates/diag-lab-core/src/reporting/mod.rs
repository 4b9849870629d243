//! Diagnostic report workflow.
//!
//! Reads the catalog's parameter definitions and an invoice's billed tests,
//! writes reports and their results, and keeps the doctor directory that
//! reports point at.

mod doctors;
mod results;
mod workflow;

pub use doctors::*;
pub use results::*;
pub use workflow::*;
