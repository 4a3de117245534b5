//! Data models
//!
//! Plain value objects exchanged between the catalog collaborator, the
//! settlement engine and the persistence collaborator. All IDs are `i64`,
//! all money and percentage values are `Decimal`.

pub mod income_group;
pub mod income_record;
pub mod period;
pub mod settlement;
pub mod volume;

// Re-exports
pub use income_group::*;
pub use income_record::*;
pub use period::*;
pub use settlement::*;
pub use volume::*;
