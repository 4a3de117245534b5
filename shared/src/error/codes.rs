//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Settlement lifecycle errors
//! - 5xxx: Catalog errors
//! - 6xxx: Report/export errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,

    // ==================== 4xxx: Settlement ====================
    /// Settlement snapshot not found
    SettlementNotFound = 4001,
    /// Settlement has already been finalized
    SettlementAlreadyFinalized = 4002,
    /// Settlement is not finalized (revision requires a finalized source)
    SettlementNotFinalized = 4003,
    /// A snapshot already exists for this group and period
    SettlementPeriodExists = 4004,
    /// Finalize was declined by the operator
    FinalizeDeclined = 4005,
    /// Invalid settlement period
    InvalidPeriod = 4006,
    /// A later revision already exists for this group and period
    SettlementSuperseded = 4007,

    // ==================== 5xxx: Catalog ====================
    /// Income group not found
    IncomeGroupNotFound = 5001,
    /// Income record not found
    IncomeRecordNotFound = 5002,
    /// Income group is inactive
    IncomeGroupInactive = 5003,

    // ==================== 6xxx: Report ====================
    /// Report serialization failed
    ReportSerializationFailed = 6001,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Storage error
    StorageError = 9002,
    /// Configuration error
    ConfigError = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",

            // Settlement
            ErrorCode::SettlementNotFound => "Settlement not found",
            ErrorCode::SettlementAlreadyFinalized => "Settlement has already been finalized",
            ErrorCode::SettlementNotFinalized => "Settlement is not finalized",
            ErrorCode::SettlementPeriodExists => {
                "A settlement already exists for this group and period"
            }
            ErrorCode::FinalizeDeclined => "Finalize was declined",
            ErrorCode::InvalidPeriod => "Invalid settlement period",
            ErrorCode::SettlementSuperseded => "Settlement has been superseded by a later revision",

            // Catalog
            ErrorCode::IncomeGroupNotFound => "Income group not found",
            ErrorCode::IncomeRecordNotFound => "Income record not found",
            ErrorCode::IncomeGroupInactive => "Income group is inactive",

            // Report
            ErrorCode::ReportSerializationFailed => "Report serialization failed",

            // System
            ErrorCode::InternalError => "Internal error",
            ErrorCode::StorageError => "Storage error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),

            // Settlement
            4001 => Ok(ErrorCode::SettlementNotFound),
            4002 => Ok(ErrorCode::SettlementAlreadyFinalized),
            4003 => Ok(ErrorCode::SettlementNotFinalized),
            4004 => Ok(ErrorCode::SettlementPeriodExists),
            4005 => Ok(ErrorCode::FinalizeDeclined),
            4006 => Ok(ErrorCode::InvalidPeriod),
            4007 => Ok(ErrorCode::SettlementSuperseded),

            // Catalog
            5001 => Ok(ErrorCode::IncomeGroupNotFound),
            5002 => Ok(ErrorCode::IncomeRecordNotFound),
            5003 => Ok(ErrorCode::IncomeGroupInactive),

            // Report
            6001 => Ok(ErrorCode::ReportSerializationFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StorageError),
            9003 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
