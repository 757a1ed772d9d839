//! Subscription Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ParseEnumError;

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
    Pending,
    Frozen,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Expired => "EXPIRED",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::Pending => "PENDING",
            SubscriptionStatus::Frozen => "FROZEN",
        }
    }

    /// Whether the status alone means the membership has lapsed
    pub fn is_lapsed(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Expired | SubscriptionStatus::Cancelled
        )
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "EXPIRED" => Ok(SubscriptionStatus::Expired),
            "CANCELLED" => Ok(SubscriptionStatus::Cancelled),
            "PENDING" => Ok(SubscriptionStatus::Pending),
            "FROZEN" => Ok(SubscriptionStatus::Frozen),
            other => Err(ParseEnumError::new("subscription status", other)),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Member subscription to a membership plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub member_id: i64,
    pub plan_id: i64,
    pub status: SubscriptionStatus,
    pub start_date: i64,
    pub end_date: Option<i64>,
}
