//! gym-cloud: member retention service
//!
//! - Scores every active member for churn risk from attendance,
//!   subscription and payment activity
//! - Opens follow-up tasks for staff when a member turns HIGH risk
//! - Serves the retention dashboard API (JWT authenticated)

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod retention;
pub mod state;
pub mod validation;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
