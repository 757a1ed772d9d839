//! Data models
//!
//! Shared between the retention service and its clients (via API).
//! Rows with textual enums are decoded in the service's data-access layer;
//! plain rows use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` snowflakes, all timestamps are Unix milliseconds.

pub mod attendance;
pub mod member;
pub mod payment;
pub mod retention;
pub mod role;
pub mod serde_helpers;
pub mod staff;
pub mod subscription;

// Re-exports
pub use attendance::*;
pub use member::*;
pub use payment::*;
pub use retention::*;
pub use role::*;
pub use staff::*;
pub use subscription::*;

/// Error for textual enum values that match no variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
