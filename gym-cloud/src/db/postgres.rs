//! PostgreSQL implementation of [`RetentionStore`]
//!
//! Textual enum columns are read into `String` row structs and converted here;
//! all queries enforce tenant_id isolation.

use async_trait::async_trait;
use shared::models::{
    Member, PaymentStatus, RetentionMember, RetentionOverview, RetentionRisk, RetentionTask,
    Subscription, TaskStatus,
};
use shared::response::PageRequest;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{
    MemberActivity, RepoError, RepoResult, RetentionStore, RiskFilter, SubscriptionSnapshot,
    TaskFilter,
};

/// PostgreSQL-backed retention store
#[derive(Clone)]
pub struct PgRetentionStore {
    pool: PgPool,
}

impl PgRetentionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ── Row types ───────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct ActivityRow {
    member_id: i64,
    last_check_in_at: Option<i64>,
    subscription_status: Option<String>,
    subscription_start: Option<i64>,
    subscription_end: Option<i64>,
    pending_payments: i64,
    prior_high_since: Option<i64>,
}

impl From<ActivityRow> for MemberActivity {
    fn from(row: ActivityRow) -> Self {
        let subscription = match (row.subscription_status, row.subscription_start) {
            (Some(status), Some(start_date)) => Some(SubscriptionSnapshot {
                status,
                start_date,
                end_date: row.subscription_end,
            }),
            _ => None,
        };
        MemberActivity {
            member_id: row.member_id,
            last_check_in_at: row.last_check_in_at,
            subscription,
            pending_payments: row.pending_payments,
            prior_high_since: row.prior_high_since,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RiskRow {
    member_id: i64,
    risk_level: String,
    score: i32,
    reasons: Json<Vec<String>>,
    last_check_in_at: Option<i64>,
    days_since_check_in: Option<i64>,
    subscription_ends_at: Option<i64>,
    unpaid_pending_count: i32,
    high_since: Option<i64>,
    last_evaluated_at: i64,
}

impl TryFrom<RiskRow> for RetentionRisk {
    type Error = RepoError;

    fn try_from(row: RiskRow) -> Result<Self, Self::Error> {
        let risk_level = row
            .risk_level
            .parse()
            .map_err(|e| RepoError::InvalidData(format!("retention_risks {}: {e}", row.member_id)))?;
        Ok(RetentionRisk {
            member_id: row.member_id,
            risk_level,
            score: row.score,
            reasons: row.reasons.0,
            last_check_in_at: row.last_check_in_at,
            days_since_check_in: row.days_since_check_in,
            subscription_ends_at: row.subscription_ends_at,
            unpaid_pending_count: row.unpaid_pending_count,
            high_since: row.high_since,
            last_evaluated_at: row.last_evaluated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RiskMemberRow {
    #[sqlx(flatten)]
    risk: RiskRow,
    name: String,
    email: Option<String>,
    phone: Option<String>,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    member_id: i64,
    assigned_to_id: Option<i64>,
    status: String,
    priority: i32,
    title: String,
    note: Option<String>,
    due_date: Option<i64>,
    created_by_id: Option<i64>,
    resolved_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<TaskRow> for RetentionTask {
    type Error = RepoError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| RepoError::InvalidData(format!("retention_tasks {}: {e}", row.id)))?;
        Ok(RetentionTask {
            id: row.id,
            member_id: row.member_id,
            assigned_to_id: row.assigned_to_id,
            status,
            priority: row.priority,
            title: row.title,
            note: row.note,
            due_date: row.due_date,
            created_by_id: row.created_by_id,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    member_id: i64,
    plan_id: i64,
    status: String,
    start_date: i64,
    end_date: Option<i64>,
}

const RISK_COLUMNS: &str = "r.member_id, r.risk_level, r.score, r.reasons, r.last_check_in_at, \
     r.days_since_check_in, r.subscription_ends_at, r.unpaid_pending_count, r.high_since, \
     r.last_evaluated_at";

const TASK_COLUMNS: &str = "id, member_id, assigned_to_id, status, priority, title, note, \
     due_date, created_by_id, resolved_at, created_at, updated_at";

const RISK_FILTER: &str = r#"
    r.tenant_id = $1
    AND ($2::TEXT IS NULL OR r.risk_level = $2)
    AND ($3::INT IS NULL OR r.score >= $3)
    AND (
        $4::TEXT IS NULL
        OR m.name ILIKE $4 ESCAPE '\'
        OR m.email ILIKE $4 ESCAPE '\'
        OR m.phone ILIKE $4 ESCAPE '\'
    )
"#;

/// Snapshots of deactivated members stay in the table but are not reported
const RISK_FROM: &str = "retention_risks r JOIN members m ON m.id = r.member_id AND m.is_active";

const TASK_FILTER: &str = r#"
    tenant_id = $1
    AND ($2::TEXT IS NULL OR status = $2)
    AND ($3::INT IS NULL OR priority = $3)
    AND ($4::BIGINT IS NULL OR assigned_to_id = $4)
    AND ($5::BIGINT IS NULL OR member_id = $5)
"#;

/// `ILIKE` pattern matching `text` literally anywhere in the column
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn tasks_from_rows(rows: Vec<TaskRow>) -> RepoResult<Vec<RetentionTask>> {
    rows.into_iter().map(RetentionTask::try_from).collect()
}

#[async_trait]
impl RetentionStore for PgRetentionStore {
    async fn list_tenant_ids(&self) -> RepoResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT tenant_id FROM members WHERE is_active ORDER BY tenant_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn load_member_activity(&self, tenant_id: &str) -> RepoResult<Vec<MemberActivity>> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            r#"
            SELECT
                m.id AS member_id,
                (SELECT MAX(a.check_in_at) FROM attendance_records a WHERE a.member_id = m.id)
                    AS last_check_in_at,
                s.status AS subscription_status,
                s.start_date AS subscription_start,
                s.end_date AS subscription_end,
                (SELECT COUNT(*) FROM payments p WHERE p.member_id = m.id AND p.status = $2)
                    AS pending_payments,
                r.high_since AS prior_high_since
            FROM members m
            LEFT JOIN LATERAL (
                SELECT status, start_date, end_date
                FROM subscriptions
                WHERE member_id = m.id
                ORDER BY (status = 'ACTIVE') DESC, end_date DESC NULLS FIRST, start_date DESC
                LIMIT 1
            ) s ON TRUE
            LEFT JOIN retention_risks r ON r.member_id = m.id
            WHERE m.tenant_id = $1 AND m.is_active
            ORDER BY m.id
            "#,
        )
        .bind(tenant_id)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MemberActivity::from).collect())
    }

    async fn upsert_risk(&self, tenant_id: &str, risk: &RetentionRisk) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO retention_risks (
                member_id, tenant_id, risk_level, score, reasons, last_check_in_at,
                days_since_check_in, subscription_ends_at, unpaid_pending_count,
                high_since, last_evaluated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (member_id) DO UPDATE SET
                tenant_id = EXCLUDED.tenant_id,
                risk_level = EXCLUDED.risk_level,
                score = EXCLUDED.score,
                reasons = EXCLUDED.reasons,
                last_check_in_at = EXCLUDED.last_check_in_at,
                days_since_check_in = EXCLUDED.days_since_check_in,
                subscription_ends_at = EXCLUDED.subscription_ends_at,
                unpaid_pending_count = EXCLUDED.unpaid_pending_count,
                high_since = EXCLUDED.high_since,
                last_evaluated_at = EXCLUDED.last_evaluated_at
            "#,
        )
        .bind(risk.member_id)
        .bind(tenant_id)
        .bind(risk.risk_level.as_str())
        .bind(risk.score)
        .bind(Json(&risk.reasons))
        .bind(risk.last_check_in_at)
        .bind(risk.days_since_check_in)
        .bind(risk.subscription_ends_at)
        .bind(risk.unpaid_pending_count)
        .bind(risk.high_since)
        .bind(risk.last_evaluated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn has_active_task(&self, tenant_id: &str, member_id: i64) -> RepoResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM retention_tasks
                WHERE tenant_id = $1 AND member_id = $2 AND status IN ($3, $4)
            )
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(TaskStatus::Open.as_str())
        .bind(TaskStatus::InProgress.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn dismiss_system_open_tasks(
        &self,
        tenant_id: &str,
        member_id: i64,
        now: i64,
        note: &str,
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE retention_tasks
            SET status = $4,
                resolved_at = $3,
                updated_at = $3,
                note = COALESCE(note || E'\n', '') || $5
            WHERE tenant_id = $1
              AND member_id = $2
              AND status = $6
              AND created_by_id IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(now)
        .bind(TaskStatus::Dismissed.as_str())
        .bind(note)
        .bind(TaskStatus::Open.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn overview(
        &self,
        tenant_id: &str,
        new_high_since: i64,
    ) -> RepoResult<RetentionOverview> {
        let (high_risk, medium_risk, low_risk, new_high_this_week, evaluated_members): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE r.risk_level = 'HIGH'),
                COUNT(*) FILTER (WHERE r.risk_level = 'MEDIUM'),
                COUNT(*) FILTER (WHERE r.risk_level = 'LOW'),
                COUNT(*) FILTER (WHERE r.risk_level = 'HIGH' AND r.high_since >= $2),
                COUNT(*)
            FROM retention_risks r
            JOIN members m ON m.id = r.member_id AND m.is_active
            WHERE r.tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(new_high_since)
        .fetch_one(&self.pool)
        .await?;

        let (open_tasks,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM retention_tasks t
            JOIN members m ON m.id = t.member_id AND m.is_active
            WHERE t.tenant_id = $1 AND t.status IN ($2, $3)
            "#,
        )
        .bind(tenant_id)
        .bind(TaskStatus::Open.as_str())
        .bind(TaskStatus::InProgress.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(RetentionOverview {
            high_risk,
            medium_risk,
            low_risk,
            new_high_this_week,
            open_tasks,
            evaluated_members,
        })
    }

    async fn list_risks(
        &self,
        tenant_id: &str,
        filter: &RiskFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<RetentionMember>, u64)> {
        let level = filter.risk_level.map(|l| l.as_str());
        let pattern = filter.search.as_deref().map(contains_pattern);

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {RISK_FROM} WHERE {RISK_FILTER}"
        ))
        .bind(tenant_id)
        .bind(level)
        .bind(filter.min_score)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<RiskMemberRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RISK_COLUMNS}, m.name, m.email, m.phone
            FROM {RISK_FROM}
            WHERE {RISK_FILTER}
            ORDER BY r.score DESC, r.member_id ASC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(tenant_id)
        .bind(level)
        .bind(filter.min_score)
        .bind(pattern.as_deref())
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| -> RepoResult<RetentionMember> {
                Ok(RetentionMember {
                    risk: row.risk.try_into()?,
                    name: row.name,
                    email: row.email,
                    phone: row.phone,
                })
            })
            .collect::<RepoResult<Vec<_>>>()?;
        Ok((items, total.max(0) as u64))
    }

    async fn find_member(&self, tenant_id: &str, member_id: i64) -> RepoResult<Option<Member>> {
        let row: Option<Member> = sqlx::query_as(
            r#"
            SELECT id, name, email, phone, is_active, created_at, updated_at
            FROM members
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(member_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_risk(
        &self,
        tenant_id: &str,
        member_id: i64,
    ) -> RepoResult<Option<RetentionRisk>> {
        let row: Option<RiskRow> = sqlx::query_as(&format!(
            "SELECT {RISK_COLUMNS} FROM retention_risks r WHERE r.member_id = $1 AND r.tenant_id = $2"
        ))
        .bind(member_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RetentionRisk::try_from).transpose()
    }

    async fn recent_subscriptions(
        &self,
        tenant_id: &str,
        member_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, member_id, plan_id, status, start_date, end_date
            FROM subscriptions
            WHERE tenant_id = $1 AND member_id = $2
            ORDER BY start_date DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(member_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let subscriptions = rows
            .into_iter()
            .filter_map(|row| match row.status.parse() {
                Ok(status) => Some(Subscription {
                    id: row.id,
                    member_id: row.member_id,
                    plan_id: row.plan_id,
                    status,
                    start_date: row.start_date,
                    end_date: row.end_date,
                }),
                Err(e) => {
                    tracing::warn!(subscription_id = row.id, "Skipping subscription: {e}");
                    None
                }
            })
            .collect();
        Ok(subscriptions)
    }

    async fn recent_tasks(
        &self,
        tenant_id: &str,
        member_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<RetentionTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM retention_tasks
            WHERE tenant_id = $1 AND member_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        ))
        .bind(tenant_id)
        .bind(member_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        tasks_from_rows(rows)
    }

    async fn list_tasks(
        &self,
        tenant_id: &str,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<RetentionTask>, u64)> {
        let status = filter.status.map(|s| s.as_str());

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM retention_tasks WHERE {TASK_FILTER}"
        ))
        .bind(tenant_id)
        .bind(status)
        .bind(filter.priority)
        .bind(filter.assigned_to_id)
        .bind(filter.member_id)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM retention_tasks
            WHERE {TASK_FILTER}
            ORDER BY priority ASC, due_date ASC NULLS LAST, created_at ASC, id ASC
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(tenant_id)
        .bind(status)
        .bind(filter.priority)
        .bind(filter.assigned_to_id)
        .bind(filter.member_id)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((tasks_from_rows(rows)?, total.max(0) as u64))
    }

    async fn find_task(&self, tenant_id: &str, task_id: i64) -> RepoResult<Option<RetentionTask>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM retention_tasks WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(task_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RetentionTask::try_from).transpose()
    }

    async fn insert_task(&self, tenant_id: &str, task: &RetentionTask) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO retention_tasks (
                id, tenant_id, member_id, assigned_to_id, status, priority, title, note,
                due_date, created_by_id, resolved_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (member_id)
                WHERE created_by_id IS NULL AND status IN ('OPEN', 'IN_PROGRESS')
                DO NOTHING
            "#,
        )
        .bind(task.id)
        .bind(tenant_id)
        .bind(task.member_id)
        .bind(task.assigned_to_id)
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(&task.title)
        .bind(&task.note)
        .bind(task.due_date)
        .bind(task.created_by_id)
        .bind(task.resolved_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_task(&self, tenant_id: &str, task: &RetentionTask) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE retention_tasks
            SET assigned_to_id = $3,
                status = $4,
                priority = $5,
                note = $6,
                due_date = $7,
                resolved_at = $8,
                updated_at = $9
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(task.id)
        .bind(tenant_id)
        .bind(task.assigned_to_id)
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(&task.note)
        .bind(task.due_date)
        .bind(task.resolved_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Retention task {}", task.id)));
        }
        Ok(())
    }

    async fn staff_is_active(&self, tenant_id: &str, staff_id: i64) -> RepoResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM staff WHERE id = $1 AND tenant_id = $2 AND is_active)",
        )
        .bind(staff_id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
