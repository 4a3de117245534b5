//! Settlement Calculation Engine
//!
//! Given an income group's records, the operator-entered volumes and the
//! exclusion policy, produces per-row results, primary / additional / grand
//! totals and merges manual overrides on top of the computed aggregates.
//!
//! The engine holds no state and performs no I/O. Callers recompute from
//! scratch whenever an input changes.

mod anomaly;
mod calculator;
mod totals;

pub use anomaly::CalculationAnomaly;
pub use calculator::*;
pub use totals::*;
