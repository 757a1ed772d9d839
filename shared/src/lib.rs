//! Shared types for the gym platform
//!
//! Common types used across crates: error codes and the response envelope,
//! pagination, domain models and time/ID utilities.

pub mod error;
pub mod models;
pub mod response;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use response::{Page, PageRequest};
