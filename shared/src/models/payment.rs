//! Payment Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ParseEnumError;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "REJECTED" => Ok(PaymentStatus::Rejected),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

/// Payment against a subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub member_id: i64,
    pub subscription_id: Option<i64>,
    pub amount: f64,
    pub status: PaymentStatus,
    pub created_at: i64,
}
