//! Input validation helpers
//!
//! Text length limits and checks shared by the task endpoints.

use shared::error::{AppError, ErrorCode};
use shared::models::{TASK_PRIORITY_MAX, TASK_PRIORITY_MIN};

// ── Text length limits ──────────────────────────────────────────────

/// Task titles
pub const MAX_TITLE_LEN: usize = 200;

/// Task notes
pub const MAX_NOTE_LEN: usize = 500;

/// Free-text search terms
pub const MAX_SEARCH_LEN: usize = 100;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            format!("{field} must not be empty"),
        )
        .with_detail("field", field));
    }
    if value.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.chars().count()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: Option<&str>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.chars().count() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.chars().count()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// Validate a task priority (1 = most urgent, 3 = least).
pub fn validate_priority(priority: i32) -> Result<(), AppError> {
    if !(TASK_PRIORITY_MIN..=TASK_PRIORITY_MAX).contains(&priority) {
        return Err(AppError::new(ErrorCode::RetentionTaskInvalidPriority)
            .with_detail("priority", priority));
    }
    Ok(())
}
