//! Attendance Model

use serde::{Deserialize, Serialize};

/// A check-in (and optional check-out), optionally tied to a class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct AttendanceRecord {
    pub id: i64,
    pub member_id: i64,
    pub class_schedule_id: Option<i64>,
    pub check_in_at: i64,
    pub check_out_at: Option<i64>,
}
