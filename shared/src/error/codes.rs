//! Unified error codes for the gym platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Member errors
//! - 4xxx: Retention errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 3xxx: Member ====================
    /// Member not found
    MemberNotFound = 3001,
    /// Subscription data is malformed
    SubscriptionInvalid = 3101,
    /// Staff not found (or inactive)
    StaffNotFound = 3201,

    // ==================== 4xxx: Retention ====================
    /// Retention task not found
    RetentionTaskNotFound = 4001,
    /// Retention task status is not a known status
    RetentionTaskInvalidStatus = 4002,
    /// Retention task priority out of range
    RetentionTaskInvalidPriority = 4003,
    /// Task update carries no fields
    RetentionTaskEmptyUpdate = 4004,
    /// Bulk update with no task ids
    BulkUpdateEmpty = 4005,
    /// Bulk update with too many task ids
    BulkUpdateTooLarge = 4006,
    /// Risk level filter is not a known level
    RiskLevelInvalid = 4101,
    /// Retention rule table is inconsistent
    RetentionRulesInvalid = 4201,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Specific role is required",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Member
            ErrorCode::MemberNotFound => "Member not found",
            ErrorCode::SubscriptionInvalid => "Subscription data is invalid",
            ErrorCode::StaffNotFound => "Staff member not found",

            // Retention
            ErrorCode::RetentionTaskNotFound => "Retention task not found",
            ErrorCode::RetentionTaskInvalidStatus => "Invalid retention task status",
            ErrorCode::RetentionTaskInvalidPriority => "Task priority must be between 1 and 3",
            ErrorCode::RetentionTaskEmptyUpdate => "Task update must change at least one field",
            ErrorCode::BulkUpdateEmpty => "At least one task id is required",
            ErrorCode::BulkUpdateTooLarge => "Too many task ids in one bulk update",
            ErrorCode::RiskLevelInvalid => "Invalid risk level",
            ErrorCode::RetentionRulesInvalid => "Retention rules are invalid",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),

            // Member
            3001 => Ok(ErrorCode::MemberNotFound),
            3101 => Ok(ErrorCode::SubscriptionInvalid),
            3201 => Ok(ErrorCode::StaffNotFound),

            // Retention
            4001 => Ok(ErrorCode::RetentionTaskNotFound),
            4002 => Ok(ErrorCode::RetentionTaskInvalidStatus),
            4003 => Ok(ErrorCode::RetentionTaskInvalidPriority),
            4004 => Ok(ErrorCode::RetentionTaskEmptyUpdate),
            4005 => Ok(ErrorCode::BulkUpdateEmpty),
            4006 => Ok(ErrorCode::BulkUpdateTooLarge),
            4101 => Ok(ErrorCode::RiskLevelInvalid),
            4201 => Ok(ErrorCode::RetentionRulesInvalid),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
