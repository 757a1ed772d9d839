//! Retention rule table
//!
//! Point weights and thresholds used by the evaluator. Defaults are built in;
//! a JSON file (`RETENTION_RULES_PATH`) may override any subset of fields.

use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{RiskLevel, TASK_PRIORITY_MAX, TASK_PRIORITY_MIN};

use crate::BoxError;

/// Inactivity step: `points` once a member has not checked in for `days`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactivityTier {
    pub days: i64,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionRules {
    /// Strictly ascending by `days`; the highest reached tier applies
    pub inactivity_tiers: Vec<InactivityTier>,
    /// Never checked in at all; at least the largest tier
    pub never_checked_in_points: i32,
    /// No subscription, or the latest one is expired/cancelled
    pub lapsed_subscription_points: i32,
    pub expiring_window_days: i64,
    pub expiring_points: i32,
    /// Per pending payment, for at most `pending_payment_cap` payments
    pub pending_payment_points: i32,
    pub pending_payment_cap: i32,
    pub medium_threshold: i32,
    pub high_threshold: i32,
    /// Follow-up task opened when a member turns HIGH
    pub high_risk_task_priority: i32,
    pub high_risk_task_due_days: i64,
}

impl Default for RetentionRules {
    fn default() -> Self {
        Self {
            inactivity_tiers: vec![
                InactivityTier { days: 14, points: 15 },
                InactivityTier { days: 30, points: 35 },
            ],
            never_checked_in_points: 40,
            lapsed_subscription_points: 30,
            expiring_window_days: 7,
            expiring_points: 20,
            pending_payment_points: 15,
            pending_payment_cap: 3,
            medium_threshold: 30,
            high_threshold: 60,
            high_risk_task_priority: 1,
            high_risk_task_due_days: 3,
        }
    }
}

impl RetentionRules {
    /// Load rules from an optional JSON file, falling back to defaults
    pub fn load(path: Option<&str>) -> Result<Self, BoxError> {
        let rules = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read retention rules {path}: {e}"))?;
                let rules: Self = serde_json::from_str(&raw)
                    .map_err(|e| format!("cannot parse retention rules {path}: {e}"))?;
                tracing::info!(path, "Loaded retention rules");
                rules
            }
            None => Self::default(),
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Reject rule tables that would make scoring inconsistent
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |reason: &str| -> Result<(), AppError> {
            Err(AppError::with_message(
                ErrorCode::RetentionRulesInvalid,
                format!("Retention rules are invalid: {reason}"),
            ))
        };

        let mut previous_days = 0;
        for tier in &self.inactivity_tiers {
            if tier.days <= previous_days {
                return invalid("inactivity tiers must have strictly ascending positive days");
            }
            if tier.points < 0 {
                return invalid("inactivity tier points must not be negative");
            }
            previous_days = tier.days;
        }

        let max_tier = self
            .inactivity_tiers
            .iter()
            .map(|t| t.points)
            .max()
            .unwrap_or(0);
        if self.never_checked_in_points < max_tier {
            return invalid("never-checked-in points must be at least the largest inactivity tier");
        }

        if [
            self.never_checked_in_points,
            self.lapsed_subscription_points,
            self.expiring_points,
            self.pending_payment_points,
            self.pending_payment_cap,
        ]
        .iter()
        .any(|p| *p < 0)
        {
            return invalid("points and caps must not be negative");
        }
        if self.expiring_window_days < 0 || self.high_risk_task_due_days < 0 {
            return invalid("day windows must not be negative");
        }
        if self.medium_threshold <= 0 || self.high_threshold <= self.medium_threshold {
            return invalid("thresholds must satisfy 0 < medium < high");
        }
        if !(TASK_PRIORITY_MIN..=TASK_PRIORITY_MAX).contains(&self.high_risk_task_priority) {
            return invalid("high-risk task priority must be between 1 and 3");
        }
        Ok(())
    }

    /// Points for `days` without a check-in (0 below the first tier)
    pub fn inactivity_points(&self, days: i64) -> i32 {
        self.inactivity_tiers
            .iter()
            .rev()
            .find(|tier| days >= tier.days)
            .map_or(0, |tier| tier.points)
    }

    pub fn level_for(&self, score: i32) -> RiskLevel {
        if score >= self.high_threshold {
            RiskLevel::High
        } else if score >= self.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}
