//! Hakediş settlement engine
//!
//! Computes periodic income-sharing settlements between an institution and
//! the platform for a group of income records:
//!
//! - [`revenue`]: per-row margin for each revenue model, split policy and
//!   additional-income rule
//! - [`engine`]: the pure calculation over one group, with totals, manual
//!   override merge and data anomalies
//! - [`lifecycle`]: Draft/Finalized state machine and the finalize gate
//! - [`report`]: flat tabular export and CSV serialization
//! - [`repository`]: catalog and snapshot storage seams
//! - [`service`]: application façade tying the above together

pub mod core;
pub mod engine;
pub mod lifecycle;
pub mod money;
pub mod report;
pub mod repository;
pub mod revenue;
pub mod service;
pub mod utils;

// Re-exports
pub use crate::core::EngineConfig;
pub use engine::{
    CalculationAnomaly, CalculationInput, CalculationOptions, SettlementCalculation, calculate,
};
pub use lifecycle::{Confirmation, FinalizeOutcome, LifecycleError};
pub use report::{ReportFormatter, SettlementReport};
pub use service::{SettlementDocument, SettlementService};
