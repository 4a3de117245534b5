//! Shared types for the Hakediş settlement workspace
//!
//! Data model consumed and produced by the settlement engine, plus the
//! unified error codes used by every layer above it.

pub mod error;
pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use rust_decimal::Decimal;
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
