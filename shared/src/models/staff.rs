//! Staff Model

use serde::{Deserialize, Serialize};

/// Club staff member (trainer, front desk, manager)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Staff {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}
