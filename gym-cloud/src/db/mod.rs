//! Database access layer
//!
//! [`RetentionStore`] is the seam between the retention services and storage.
//! Production uses [`PgRetentionStore`]; every call is scoped by `tenant_id`.

pub mod postgres;

pub use postgres::PgRetentionStore;

use async_trait::async_trait;
use shared::models::{
    Member, RetentionMember, RetentionOverview, RetentionRisk, RetentionTask, RiskLevel,
    Subscription, TaskStatus,
};
use shared::response::PageRequest;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded (unknown enum text, bad JSON)
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Latest subscription of a member, status still as stored
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSnapshot {
    pub status: String,
    pub start_date: i64,
    pub end_date: Option<i64>,
}

/// Evaluator input: everything needed to score one member
#[derive(Debug, Clone, PartialEq)]
pub struct MemberActivity {
    pub member_id: i64,
    /// Most recent attendance check-in
    pub last_check_in_at: Option<i64>,
    /// ACTIVE first, then latest end date
    pub subscription: Option<SubscriptionSnapshot>,
    pub pending_payments: i64,
    /// `high_since` of the previous snapshot, if any
    pub prior_high_since: Option<i64>,
}

/// Filters for the risk listing
#[derive(Debug, Clone, Default)]
pub struct RiskFilter {
    pub risk_level: Option<RiskLevel>,
    pub min_score: Option<i32>,
    /// Case-insensitive substring of name, email or phone
    pub search: Option<String>,
}

/// Filters for the task listing
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<i32>,
    pub assigned_to_id: Option<i64>,
    pub member_id: Option<i64>,
}

/// Storage operations used by the retention services
#[async_trait]
pub trait RetentionStore: Send + Sync {
    // ── Evaluator ───────────────────────────────────────────────────

    /// Tenants that have at least one active member
    async fn list_tenant_ids(&self) -> RepoResult<Vec<String>>;

    /// One entry per active member of the tenant, ordered by member id
    async fn load_member_activity(&self, tenant_id: &str) -> RepoResult<Vec<MemberActivity>>;

    /// Insert or overwrite the member's snapshot
    async fn upsert_risk(&self, tenant_id: &str, risk: &RetentionRisk) -> RepoResult<()>;

    /// Whether the member has an OPEN or IN_PROGRESS task
    async fn has_active_task(&self, tenant_id: &str, member_id: i64) -> RepoResult<bool>;

    /// Dismiss the member's OPEN evaluator-created tasks, appending `note`.
    /// Returns the number of tasks dismissed.
    async fn dismiss_system_open_tasks(
        &self,
        tenant_id: &str,
        member_id: i64,
        now: i64,
        note: &str,
    ) -> RepoResult<u64>;

    // ── Queries ─────────────────────────────────────────────────────

    /// Dashboard counters; `new_high_since` is the lower bound for "new HIGH".
    /// Deactivated members are left out of every count.
    async fn overview(&self, tenant_id: &str, new_high_since: i64)
    -> RepoResult<RetentionOverview>;

    /// Snapshots of active members joined with their contact details, score
    /// DESC then member id. `search` matches literally (no wildcards).
    async fn list_risks(
        &self,
        tenant_id: &str,
        filter: &RiskFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<RetentionMember>, u64)>;

    async fn find_member(&self, tenant_id: &str, member_id: i64) -> RepoResult<Option<Member>>;

    async fn find_risk(&self, tenant_id: &str, member_id: i64)
    -> RepoResult<Option<RetentionRisk>>;

    /// Newest subscriptions first
    async fn recent_subscriptions(
        &self,
        tenant_id: &str,
        member_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<Subscription>>;

    /// Newest tasks first
    async fn recent_tasks(
        &self,
        tenant_id: &str,
        member_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<RetentionTask>>;

    // ── Tasks ───────────────────────────────────────────────────────

    /// Priority ASC, due date ASC (missing last), then creation order
    async fn list_tasks(
        &self,
        tenant_id: &str,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<RetentionTask>, u64)>;

    async fn find_task(&self, tenant_id: &str, task_id: i64) -> RepoResult<Option<RetentionTask>>;

    /// Insert a task. Returns `false` when the member already has an active
    /// evaluator-created task and this one is evaluator-created too. Any other
    /// constraint violation (a reused id, say) is an error.
    async fn insert_task(&self, tenant_id: &str, task: &RetentionTask) -> RepoResult<bool>;

    /// Overwrite the mutable columns of an existing task
    async fn update_task(&self, tenant_id: &str, task: &RetentionTask) -> RepoResult<()>;

    async fn staff_is_active(&self, tenant_id: &str, staff_id: i64) -> RepoResult<bool>;
}
