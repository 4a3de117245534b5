//! Common types for the shared crate

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// Identifier of an income-sharing record
pub type RecordId = i64;

/// Identifier of an income group
pub type GroupId = i64;

/// Identifier of a persisted settlement snapshot
pub type SettlementId = i64;
