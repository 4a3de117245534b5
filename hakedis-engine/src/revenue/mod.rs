//! Revenue Rules
//!
//! Pure per-row arithmetic used by the settlement engine:
//! - [`compute_row_margin`]: margin formula selected by the record's revenue model
//! - [`compute_shares`]: institution / platform split of a margin
//! - [`compute_additional_income`]: direct split of additional-income volume
//!
//! Each returns `None` when an intermediate product leaves the `Decimal` range.

mod additional;
mod model;
mod split;

pub use additional::*;
pub use model::*;
pub use split::*;
