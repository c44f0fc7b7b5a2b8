//! Inspection helpers for plain data.

mod duplicates;
mod type_compare;

pub use duplicates::*;
pub use type_compare::*;
