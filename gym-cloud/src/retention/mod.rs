//! Member retention: risk evaluation, follow-up tasks and dashboard queries

pub mod evaluator;
pub mod queries;
pub mod rules;
pub mod sweep;
pub mod tasks;

pub use evaluator::{Assessment, AssessError, assess, recalculate, recalculate_tenant};
pub use rules::{InactivityTier, RetentionRules};
