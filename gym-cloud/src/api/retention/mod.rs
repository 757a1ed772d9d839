//! Retention API endpoints, split into sub-modules by resource

mod members;
mod overview;
mod recalculate;
mod tasks;

use shared::error::AppError;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

// Re-export all handlers for route registration
pub use members::{get_member_detail, list_members};
pub use overview::get_overview;
pub use recalculate::recalculate;
pub use tasks::{bulk_update_tasks, create_task, list_tasks, update_task};
