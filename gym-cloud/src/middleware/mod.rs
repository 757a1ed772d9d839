//! HTTP middleware

pub mod envelope;
pub mod logging;

pub use envelope::envelope_middleware;
pub use logging::logging_middleware;
