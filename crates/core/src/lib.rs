//! Shared domain types for the memory service.
//!
//! Every other crate in the workspace depends on this one for the row types
//! that cross the store boundary, the error enum every public operation
//! returns, and the small process-wide metrics counters.

mod error;
mod metrics;
mod types;

pub use error::MnemoError;
pub use metrics::Metrics;
pub use types::{
    Job, JobStatus, JobType, MemoryItem, MemoryItemStatus, MemoryItemType, Plan, PlanStatus,
    SharedPackage, Thread, Turn,
};

/// Clamp a score into `[0, 1]`, the invariant every importance/confidence/
/// severity field must satisfy before it is persisted.
pub fn clamp_score(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Validate a score is within `[0, 1]`, returning `Validation` otherwise.
/// Unlike [`clamp_score`], this is used at write boundaries where an
/// out-of-range value is a caller error rather than something to silently fix up.
pub fn validate_score(field: &str, value: f32) -> Result<f32, MnemoError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(MnemoError::Validation(format!(
            "{field} must lie in [0, 1], got {value}"
        )))
    }
}
