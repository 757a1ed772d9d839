//! Retention Models
//!
//! Risk snapshots produced by the evaluator, follow-up tasks worked by staff,
//! and the request/response payloads of the retention API.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Member, ParseEnumError, Subscription, serde_helpers};

/// Lowest allowed task priority value (most urgent)
pub const TASK_PRIORITY_MIN: i32 = 1;
/// Highest allowed task priority value (least urgent)
pub const TASK_PRIORITY_MAX: i32 = 3;
/// Priority used when a staff-created task does not specify one
pub const TASK_PRIORITY_DEFAULT: i32 = 2;

/// Risk bucket derived from the accumulated score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(ParseEnumError::new("risk level", s)),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Follow-up task status
///
/// `OPEN → IN_PROGRESS → {DONE, DISMISSED}`. Terminal tasks stay editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
    Dismissed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "OPEN",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
            TaskStatus::Dismissed => "DISMISSED",
        }
    }

    /// DONE and DISMISSED carry a `resolvedAt` stamp
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Dismissed)
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(TaskStatus::Open),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            "DISMISSED" => Ok(TaskStatus::Dismissed),
            other => Err(ParseEnumError::new("task status", other)),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time risk snapshot of one member (overwritten on every evaluation)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionRisk {
    pub member_id: i64,
    pub risk_level: RiskLevel,
    pub score: i32,
    pub reasons: Vec<String>,
    pub last_check_in_at: Option<i64>,
    pub days_since_check_in: Option<i64>,
    pub subscription_ends_at: Option<i64>,
    pub unpaid_pending_count: i32,
    /// When the member most recently entered HIGH (None unless currently HIGH)
    pub high_since: Option<i64>,
    pub last_evaluated_at: i64,
}

/// Risk snapshot joined with the member's contact details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionMember {
    #[serde(flatten)]
    pub risk: RetentionRisk,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Staff follow-up task for an at-risk member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionTask {
    pub id: i64,
    pub member_id: i64,
    pub assigned_to_id: Option<i64>,
    pub status: TaskStatus,
    pub priority: i32,
    pub title: String,
    pub note: Option<String>,
    pub due_date: Option<i64>,
    /// Staff user who created the task; `None` for evaluator-created tasks
    pub created_by_id: Option<i64>,
    pub resolved_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create task payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionTaskCreate {
    pub member_id: i64,
    pub title: String,
    pub note: Option<String>,
    pub priority: Option<i32>,
    pub due_date: Option<i64>,
    pub assigned_to_id: Option<i64>,
}

/// Partial task update payload
///
/// `status` stays textual here so an unknown value surfaces as a validation
/// error instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionTaskUpdate {
    pub status: Option<String>,
    pub priority: Option<i32>,
    /// `null` unassigns the task
    #[serde(
        default,
        deserialize_with = "serde_helpers::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to_id: Option<Option<i64>>,
    /// Empty text clears the note
    pub note: Option<String>,
    /// `null` clears the due date
    #[serde(
        default,
        deserialize_with = "serde_helpers::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<i64>>,
}

/// Bulk task update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionTaskBulkUpdate {
    pub task_ids: Vec<i64>,
    #[serde(flatten)]
    pub update: RetentionTaskUpdate,
}

/// Bulk update outcome: existing ids are updated, missing ids reported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResult {
    pub updated: usize,
    pub not_found: Vec<i64>,
    pub tasks: Vec<RetentionTask>,
}

/// Dashboard counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionOverview {
    pub high_risk: i64,
    pub medium_risk: i64,
    pub low_risk: i64,
    pub new_high_this_week: i64,
    pub open_tasks: i64,
    pub evaluated_members: i64,
}

/// Member drill-down: snapshot plus recent tasks and subscriptions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberRetentionDetail {
    pub member: Member,
    pub risk: Option<RetentionRisk>,
    pub recent_tasks: Vec<RetentionTask>,
    pub recent_subscriptions: Vec<Subscription>,
}

/// Outcome of one evaluator pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateSummary {
    pub processed: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub skipped: usize,
    pub skipped_member_ids: Vec<i64>,
    pub tasks_created: usize,
    pub tasks_dismissed: usize,
}
