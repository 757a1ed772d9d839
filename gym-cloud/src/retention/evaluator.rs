//! Retention evaluator
//!
//! Scores every active member of a tenant from attendance recency,
//! subscription expiry and pending payments, overwrites the member's risk
//! snapshot, then opens or prunes follow-up tasks.

use shared::models::{
    RecalculateSummary, RetentionRisk, RetentionTask, RiskLevel, SubscriptionStatus, TaskStatus,
};
use shared::util::{DAY_MILLIS, snowflake_id, whole_days_between};
use thiserror::Error;

use super::rules::RetentionRules;
use crate::auth::{Action, Caller, authorize};
use crate::db::{MemberActivity, RepoError, RetentionStore};
use crate::error::ServiceResult;

/// Title of tasks the evaluator opens for HIGH risk members
pub const HIGH_RISK_TASK_TITLE: &str = "Follow up with at-risk member";

const PRUNE_NOTE: &str = "Dismissed automatically: member is back to low risk";

/// Score, level and reasons for one member
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub score: i32,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub days_since_check_in: Option<i64>,
    pub subscription_ends_at: Option<i64>,
    pub unpaid_pending_count: i32,
}

/// Member data the evaluator cannot score
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssessError {
    #[error("unknown subscription status {0:?}")]
    UnknownSubscriptionStatus(String),

    #[error("subscription ends ({end_date}) before it starts ({start_date})")]
    SubscriptionEndsBeforeStart { start_date: i64, end_date: i64 },

    #[error("negative pending payment count {0}")]
    NegativePendingCount(i64),
}

/// Whole days from `now` until `end`, rounded up
fn days_until(now: i64, end: i64) -> i64 {
    (end - now + DAY_MILLIS - 1) / DAY_MILLIS
}

/// Score one member. Pure: no I/O, `now` supplied by the caller.
pub fn assess(
    activity: &MemberActivity,
    rules: &RetentionRules,
    now: i64,
) -> Result<Assessment, AssessError> {
    let mut score = 0;
    let mut reasons = Vec::new();

    // Check-in recency
    let days_since_check_in = activity
        .last_check_in_at
        .map(|at| whole_days_between(at, now));
    match days_since_check_in {
        None => {
            score += rules.never_checked_in_points;
            reasons.push("No check-in on record".to_string());
        }
        Some(days) => {
            let points = rules.inactivity_points(days);
            if points > 0 {
                score += points;
                reasons.push(format!("No check-in for {days} days"));
            }
        }
    }

    // Subscription expiry
    let mut subscription_ends_at = None;
    match &activity.subscription {
        None => {
            score += rules.lapsed_subscription_points;
            reasons.push("No subscription on file".to_string());
        }
        Some(sub) => {
            let status: SubscriptionStatus = sub
                .status
                .parse()
                .map_err(|_| AssessError::UnknownSubscriptionStatus(sub.status.clone()))?;
            if let Some(end_date) = sub.end_date
                && end_date < sub.start_date
            {
                return Err(AssessError::SubscriptionEndsBeforeStart {
                    start_date: sub.start_date,
                    end_date,
                });
            }
            subscription_ends_at = sub.end_date;

            if status.is_lapsed() {
                score += rules.lapsed_subscription_points;
                reasons.push(format!(
                    "Subscription {}",
                    status.as_str().to_ascii_lowercase()
                ));
            } else if let Some(end_date) = sub.end_date {
                if end_date <= now {
                    score += rules.lapsed_subscription_points;
                    reasons.push(format!(
                        "Subscription expired {} days ago",
                        whole_days_between(end_date, now)
                    ));
                } else if end_date - now <= rules.expiring_window_days * DAY_MILLIS {
                    score += rules.expiring_points;
                    reasons.push(format!(
                        "Subscription expires in {} days",
                        days_until(now, end_date)
                    ));
                }
            }
        }
    }

    // Unpaid payments
    if activity.pending_payments < 0 {
        return Err(AssessError::NegativePendingCount(activity.pending_payments));
    }
    let pending = i32::try_from(activity.pending_payments).unwrap_or(i32::MAX);
    let payment_points = pending.min(rules.pending_payment_cap) * rules.pending_payment_points;
    if payment_points > 0 {
        score += payment_points;
        reasons.push(if pending == 1 {
            "1 unpaid pending payment".to_string()
        } else {
            format!("{pending} unpaid pending payments")
        });
    }

    Ok(Assessment {
        score,
        level: rules.level_for(score),
        reasons,
        days_since_check_in,
        subscription_ends_at,
        unpaid_pending_count: pending,
    })
}

#[derive(Debug, Error)]
enum MemberError {
    #[error(transparent)]
    Assess(#[from] AssessError),
    #[error(transparent)]
    Store(#[from] RepoError),
}

struct MemberOutcome {
    level: RiskLevel,
    task_created: bool,
    tasks_dismissed: u64,
}

fn high_risk_task(rules: &RetentionRules, member_id: i64, reasons: &[String], now: i64) -> RetentionTask {
    RetentionTask {
        id: snowflake_id(),
        member_id,
        assigned_to_id: None,
        status: TaskStatus::Open,
        priority: rules.high_risk_task_priority,
        title: HIGH_RISK_TASK_TITLE.to_string(),
        note: (!reasons.is_empty()).then(|| reasons.join("; ")),
        due_date: Some(now + rules.high_risk_task_due_days * DAY_MILLIS),
        created_by_id: None,
        resolved_at: None,
        created_at: now,
        updated_at: now,
    }
}

async fn evaluate_member(
    store: &dyn RetentionStore,
    rules: &RetentionRules,
    tenant_id: &str,
    activity: &MemberActivity,
    now: i64,
) -> Result<MemberOutcome, MemberError> {
    let assessment = assess(activity, rules, now)?;
    let member_id = activity.member_id;

    let high_since = match assessment.level {
        RiskLevel::High => Some(activity.prior_high_since.unwrap_or(now)),
        _ => None,
    };

    let risk = RetentionRisk {
        member_id,
        risk_level: assessment.level,
        score: assessment.score,
        reasons: assessment.reasons,
        last_check_in_at: activity.last_check_in_at,
        days_since_check_in: assessment.days_since_check_in,
        subscription_ends_at: assessment.subscription_ends_at,
        unpaid_pending_count: assessment.unpaid_pending_count,
        high_since,
        last_evaluated_at: now,
    };
    store.upsert_risk(tenant_id, &risk).await?;

    let mut outcome = MemberOutcome {
        level: risk.risk_level,
        task_created: false,
        tasks_dismissed: 0,
    };

    match risk.risk_level {
        RiskLevel::High => {
            if !store.has_active_task(tenant_id, member_id).await? {
                let task = high_risk_task(rules, member_id, &risk.reasons, now);
                outcome.task_created = store.insert_task(tenant_id, &task).await?;
            }
        }
        RiskLevel::Low => {
            outcome.tasks_dismissed = store
                .dismiss_system_open_tasks(tenant_id, member_id, now, PRUNE_NOTE)
                .await?;
        }
        RiskLevel::Medium => {}
    }

    Ok(outcome)
}

/// Evaluate every active member of one tenant
///
/// Members that cannot be scored or written are skipped and reported in the
/// summary; only a failure to load the batch aborts the run.
pub async fn recalculate_tenant(
    store: &dyn RetentionStore,
    rules: &RetentionRules,
    tenant_id: &str,
    now: i64,
) -> ServiceResult<RecalculateSummary> {
    let activities = store.load_member_activity(tenant_id).await?;
    let mut summary = RecalculateSummary::default();

    for activity in &activities {
        match evaluate_member(store, rules, tenant_id, activity, now).await {
            Ok(outcome) => {
                summary.processed += 1;
                match outcome.level {
                    RiskLevel::High => summary.high += 1,
                    RiskLevel::Medium => summary.medium += 1,
                    RiskLevel::Low => summary.low += 1,
                }
                if outcome.task_created {
                    summary.tasks_created += 1;
                }
                summary.tasks_dismissed += outcome.tasks_dismissed as usize;
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id,
                    member_id = activity.member_id,
                    error = %e,
                    "Skipping member in retention evaluation"
                );
                summary.skipped += 1;
                summary.skipped_member_ids.push(activity.member_id);
            }
        }
    }

    tracing::info!(
        tenant_id,
        processed = summary.processed,
        high = summary.high,
        medium = summary.medium,
        low = summary.low,
        skipped = summary.skipped,
        tasks_created = summary.tasks_created,
        tasks_dismissed = summary.tasks_dismissed,
        "Retention evaluation finished"
    );

    Ok(summary)
}

/// Manual evaluation of the caller's tenant (admin only)
pub async fn recalculate(
    store: &dyn RetentionStore,
    rules: &RetentionRules,
    caller: &Caller,
    now: i64,
) -> ServiceResult<RecalculateSummary> {
    authorize(caller, Action::Recalculate)?;
    tracing::info!(
        user_id = caller.user_id,
        tenant_id = %caller.tenant_id,
        "Manual retention evaluation requested"
    );
    recalculate_tenant(store, rules, &caller.tenant_id, now).await
}
