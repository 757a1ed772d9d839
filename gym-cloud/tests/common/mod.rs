//! Shared fixtures: an in-memory `RetentionStore` and HTTP helpers
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use gym_cloud::api::create_router;
use gym_cloud::auth::{Caller, create_token};
use gym_cloud::db::{
    MemberActivity, RepoError, RepoResult, RetentionStore, RiskFilter, SubscriptionSnapshot,
    TaskFilter,
};
use gym_cloud::retention::RetentionRules;
use gym_cloud::state::AppState;
use shared::models::{
    AttendanceRecord, Member, Payment, PaymentStatus, RetentionMember, RetentionOverview,
    RetentionRisk, RetentionTask, RiskLevel, Role, Staff, Subscription, TaskStatus,
};
use shared::response::PageRequest;
use shared::util::DAY_MILLIS;

pub const TENANT: &str = "gym-1";
pub const OTHER_TENANT: &str = "gym-2";
pub const SECRET: &str = "test-secret";
pub const NOW: i64 = 1_780_000_000_000;

pub fn days_ago(days: i64) -> i64 {
    NOW - days * DAY_MILLIS
}

pub fn days_from_now(days: i64) -> i64 {
    NOW + days * DAY_MILLIS
}

/// Subscription row as stored (status may be any text)
#[derive(Debug, Clone)]
struct StoredSubscription {
    id: i64,
    member_id: i64,
    plan_id: i64,
    status: String,
    start_date: i64,
    end_date: Option<i64>,
}

#[derive(Default)]
struct Inner {
    members: Vec<(String, Member)>,
    staff: Vec<(String, Staff)>,
    subscriptions: Vec<StoredSubscription>,
    attendance: Vec<AttendanceRecord>,
    payments: Vec<Payment>,
    risks: HashMap<i64, (String, RetentionRisk)>,
    tasks: Vec<(String, RetentionTask)>,
    next_id: i64,
    fail_upsert_for: HashSet<i64>,
    fail_load: bool,
    load_gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn is_active_member(&self, member_id: i64) -> bool {
        self.members
            .iter()
            .any(|(_, m)| m.id == member_id && m.is_active)
    }

    fn member_tenant(&self, member_id: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, m)| m.id == member_id)
            .map(|(t, _)| t.as_str())
    }
}

/// In-memory store mirroring the PostgreSQL store's ordering and scoping
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    // ── Seeding ─────────────────────────────────────────────────────

    pub fn add_member(&self, tenant_id: &str, id: i64, name: &str) {
        self.lock().members.push((
            tenant_id.to_string(),
            Member {
                id,
                name: name.to_string(),
                email: Some(format!("{}@example.com", name.to_lowercase())),
                phone: Some(format!("+1555{id:04}")),
                is_active: true,
                created_at: days_ago(400),
                updated_at: days_ago(400),
            },
        ));
    }

    pub fn deactivate_member(&self, id: i64) {
        if let Some((_, m)) = self.lock().members.iter_mut().find(|(_, m)| m.id == id) {
            m.is_active = false;
        }
    }

    pub fn add_staff(&self, tenant_id: &str, id: i64, is_active: bool) {
        self.lock().staff.push((
            tenant_id.to_string(),
            Staff {
                id,
                name: format!("Staff {id}"),
                is_active,
            },
        ));
    }

    pub fn add_subscription(&self, member_id: i64, status: &str, start: i64, end: Option<i64>) {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.subscriptions.push(StoredSubscription {
            id,
            member_id,
            plan_id: 1,
            status: status.to_string(),
            start_date: start,
            end_date: end,
        });
    }

    pub fn add_check_in(&self, member_id: i64, at: i64) {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.attendance.push(AttendanceRecord {
            id,
            member_id,
            class_schedule_id: None,
            check_in_at: at,
            check_out_at: Some(at + 3_600_000),
        });
    }

    pub fn add_payment(&self, member_id: i64, status: PaymentStatus) {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.payments.push(Payment {
            id,
            member_id,
            subscription_id: None,
            amount: 49.0,
            status,
            created_at: days_ago(10),
        });
    }

    pub fn set_payments_paid(&self, member_id: i64) {
        for p in self.lock().payments.iter_mut().filter(|p| p.member_id == member_id) {
            p.status = PaymentStatus::Paid;
        }
    }

    pub fn add_task(&self, tenant_id: &str, task: RetentionTask) {
        self.lock().tasks.push((tenant_id.to_string(), task));
    }

    pub fn replace_task(&self, task: RetentionTask) {
        if let Some((_, slot)) = self.lock().tasks.iter_mut().find(|(_, t)| t.id == task.id) {
            *slot = task;
        }
    }

    pub fn put_risk(&self, tenant_id: &str, risk: RetentionRisk) {
        self.lock()
            .risks
            .insert(risk.member_id, (tenant_id.to_string(), risk));
    }

    /// Make `upsert_risk` fail for one member
    pub fn fail_upsert_for(&self, member_id: i64) {
        self.lock().fail_upsert_for.insert(member_id);
    }

    pub fn fail_load(&self) {
        self.lock().fail_load = true;
    }

    /// Hold the next `load_member_activity` call: the first `Notify` fires
    /// when the load starts, the second releases it
    pub fn gate_load(&self) -> (Arc<Notify>, Arc<Notify>) {
        let gate = (Arc::new(Notify::new()), Arc::new(Notify::new()));
        self.lock().load_gate = Some(gate.clone());
        gate
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn risk(&self, member_id: i64) -> Option<RetentionRisk> {
        self.lock().risks.get(&member_id).map(|(_, r)| r.clone())
    }

    pub fn tasks_for(&self, member_id: i64) -> Vec<RetentionTask> {
        self.lock()
            .tasks
            .iter()
            .filter(|(_, t)| t.member_id == member_id)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn task(&self, task_id: i64) -> Option<RetentionTask> {
        self.lock()
            .tasks
            .iter()
            .find(|(_, t)| t.id == task_id)
            .map(|(_, t)| t.clone())
    }
}

fn is_active_status(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Open | TaskStatus::InProgress)
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl RetentionStore for MemoryStore {
    async fn list_tenant_ids(&self) -> RepoResult<Vec<String>> {
        let inner = self.lock();
        let mut ids: Vec<String> = inner
            .members
            .iter()
            .filter(|(_, m)| m.is_active)
            .map(|(t, _)| t.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn load_member_activity(&self, tenant_id: &str) -> RepoResult<Vec<MemberActivity>> {
        let gate = self.lock().load_gate.take();
        if let Some((started, release)) = gate {
            started.notify_one();
            release.notified().await;
        }

        let inner = self.lock();
        if inner.fail_load {
            return Err(RepoError::Database("connection refused".into()));
        }

        let mut members: Vec<&Member> = inner
            .members
            .iter()
            .filter(|(t, m)| t == tenant_id && m.is_active)
            .map(|(_, m)| m)
            .collect();
        members.sort_by_key(|m| m.id);

        Ok(members
            .into_iter()
            .map(|m| {
                let last_check_in_at = inner
                    .attendance
                    .iter()
                    .filter(|a| a.member_id == m.id)
                    .map(|a| a.check_in_at)
                    .max();
                let subscription = inner
                    .subscriptions
                    .iter()
                    .filter(|s| s.member_id == m.id)
                    .max_by_key(|s| {
                        (
                            s.status == "ACTIVE",
                            s.end_date.is_none(),
                            s.end_date.unwrap_or(0),
                            s.start_date,
                        )
                    })
                    .map(|s| SubscriptionSnapshot {
                        status: s.status.clone(),
                        start_date: s.start_date,
                        end_date: s.end_date,
                    });
                let pending_payments = inner
                    .payments
                    .iter()
                    .filter(|p| p.member_id == m.id && p.status == PaymentStatus::Pending)
                    .count() as i64;
                let prior_high_since = inner.risks.get(&m.id).and_then(|(_, r)| r.high_since);
                MemberActivity {
                    member_id: m.id,
                    last_check_in_at,
                    subscription,
                    pending_payments,
                    prior_high_since,
                }
            })
            .collect())
    }

    async fn upsert_risk(&self, tenant_id: &str, risk: &RetentionRisk) -> RepoResult<()> {
        let mut inner = self.lock();
        if inner.fail_upsert_for.contains(&risk.member_id) {
            return Err(RepoError::Database("deadlock detected".into()));
        }
        inner
            .risks
            .insert(risk.member_id, (tenant_id.to_string(), risk.clone()));
        Ok(())
    }

    async fn has_active_task(&self, tenant_id: &str, member_id: i64) -> RepoResult<bool> {
        Ok(self
            .lock()
            .tasks
            .iter()
            .any(|(t, task)| t == tenant_id && task.member_id == member_id && is_active_status(task.status)))
    }

    async fn dismiss_system_open_tasks(
        &self,
        tenant_id: &str,
        member_id: i64,
        now: i64,
        note: &str,
    ) -> RepoResult<u64> {
        let mut dismissed = 0;
        for (t, task) in self.lock().tasks.iter_mut() {
            if *t == tenant_id
                && task.member_id == member_id
                && task.status == TaskStatus::Open
                && task.created_by_id.is_none()
            {
                task.status = TaskStatus::Dismissed;
                task.resolved_at = Some(now);
                task.updated_at = now;
                task.note = Some(match task.note.take() {
                    Some(existing) => format!("{existing}\n{note}"),
                    None => note.to_string(),
                });
                dismissed += 1;
            }
        }
        Ok(dismissed)
    }

    async fn overview(
        &self,
        tenant_id: &str,
        new_high_since: i64,
    ) -> RepoResult<RetentionOverview> {
        let inner = self.lock();
        let risks: Vec<&RetentionRisk> = inner
            .risks
            .values()
            .filter(|(t, r)| t == tenant_id && inner.is_active_member(r.member_id))
            .map(|(_, r)| r)
            .collect();
        let count = |level: RiskLevel| risks.iter().filter(|r| r.risk_level == level).count() as i64;
        Ok(RetentionOverview {
            high_risk: count(RiskLevel::High),
            medium_risk: count(RiskLevel::Medium),
            low_risk: count(RiskLevel::Low),
            new_high_this_week: risks
                .iter()
                .filter(|r| {
                    r.risk_level == RiskLevel::High
                        && r.high_since.is_some_and(|at| at >= new_high_since)
                })
                .count() as i64,
            open_tasks: inner
                .tasks
                .iter()
                .filter(|(t, task)| {
                    t == tenant_id
                        && is_active_status(task.status)
                        && inner.is_active_member(task.member_id)
                })
                .count() as i64,
            evaluated_members: risks.len() as i64,
        })
    }

    async fn list_risks(
        &self,
        tenant_id: &str,
        filter: &RiskFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<RetentionMember>, u64)> {
        let inner = self.lock();
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut rows: Vec<RetentionMember> = inner
            .risks
            .values()
            .filter(|(t, _)| t == tenant_id)
            .filter_map(|(_, risk)| {
                let (_, member) = inner
                    .members
                    .iter()
                    .find(|(_, m)| m.id == risk.member_id && m.is_active)?;
                Some(RetentionMember {
                    risk: risk.clone(),
                    name: member.name.clone(),
                    email: member.email.clone(),
                    phone: member.phone.clone(),
                })
            })
            .filter(|row| filter.risk_level.is_none_or(|l| row.risk.risk_level == l))
            .filter(|row| filter.min_score.is_none_or(|s| row.risk.score >= s))
            .filter(|row| match &needle {
                None => true,
                Some(n) => [Some(&row.name), row.email.as_ref(), row.phone.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(n)),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.risk
                .score
                .cmp(&a.risk.score)
                .then(a.risk.member_id.cmp(&b.risk.member_id))
        });
        let total = rows.len() as u64;
        Ok((paginate(rows, page), total))
    }

    async fn find_member(&self, tenant_id: &str, member_id: i64) -> RepoResult<Option<Member>> {
        Ok(self
            .lock()
            .members
            .iter()
            .find(|(t, m)| t == tenant_id && m.id == member_id)
            .map(|(_, m)| m.clone()))
    }

    async fn find_risk(
        &self,
        tenant_id: &str,
        member_id: i64,
    ) -> RepoResult<Option<RetentionRisk>> {
        Ok(self
            .lock()
            .risks
            .get(&member_id)
            .filter(|(t, _)| t == tenant_id)
            .map(|(_, r)| r.clone()))
    }

    async fn recent_subscriptions(
        &self,
        tenant_id: &str,
        member_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<Subscription>> {
        let inner = self.lock();
        if inner.member_tenant(member_id) != Some(tenant_id) {
            return Ok(Vec::new());
        }
        let mut subs: Vec<Subscription> = inner
            .subscriptions
            .iter()
            .filter(|s| s.member_id == member_id)
            .filter_map(|s| {
                Some(Subscription {
                    id: s.id,
                    member_id: s.member_id,
                    plan_id: s.plan_id,
                    status: s.status.parse().ok()?,
                    start_date: s.start_date,
                    end_date: s.end_date,
                })
            })
            .collect();
        subs.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        subs.truncate(limit as usize);
        Ok(subs)
    }

    async fn recent_tasks(
        &self,
        tenant_id: &str,
        member_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<RetentionTask>> {
        let mut tasks: Vec<RetentionTask> = self
            .lock()
            .tasks
            .iter()
            .filter(|(t, task)| t == tenant_id && task.member_id == member_id)
            .map(|(_, task)| task.clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tasks.truncate(limit as usize);
        Ok(tasks)
    }

    async fn list_tasks(
        &self,
        tenant_id: &str,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<RetentionTask>, u64)> {
        let mut tasks: Vec<RetentionTask> = self
            .lock()
            .tasks
            .iter()
            .filter(|(t, _)| t == tenant_id)
            .map(|(_, task)| task)
            .filter(|task| filter.status.is_none_or(|s| task.status == s))
            .filter(|task| filter.priority.is_none_or(|p| task.priority == p))
            .filter(|task| {
                filter
                    .assigned_to_id
                    .is_none_or(|a| task.assigned_to_id == Some(a))
            })
            .filter(|task| filter.member_id.is_none_or(|m| task.member_id == m))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| match (a.due_date, b.due_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        let total = tasks.len() as u64;
        Ok((paginate(tasks, page), total))
    }

    async fn find_task(&self, tenant_id: &str, task_id: i64) -> RepoResult<Option<RetentionTask>> {
        Ok(self
            .lock()
            .tasks
            .iter()
            .find(|(t, task)| t == tenant_id && task.id == task_id)
            .map(|(_, task)| task.clone()))
    }

    async fn insert_task(&self, tenant_id: &str, task: &RetentionTask) -> RepoResult<bool> {
        let mut inner = self.lock();
        if inner.tasks.iter().any(|(_, t)| t.id == task.id) {
            return Err(RepoError::Database(format!(
                "duplicate key value violates unique constraint \"retention_tasks_pkey\" ({})",
                task.id
            )));
        }
        let duplicate_system = task.created_by_id.is_none()
            && is_active_status(task.status)
            && inner.tasks.iter().any(|(_, t)| {
                t.member_id == task.member_id
                    && t.created_by_id.is_none()
                    && is_active_status(t.status)
            });
        if duplicate_system {
            return Ok(false);
        }
        inner.tasks.push((tenant_id.to_string(), task.clone()));
        Ok(true)
    }

    async fn update_task(&self, tenant_id: &str, task: &RetentionTask) -> RepoResult<()> {
        let mut inner = self.lock();
        let slot = inner
            .tasks
            .iter_mut()
            .find(|(t, existing)| t == tenant_id && existing.id == task.id)
            .ok_or_else(|| RepoError::NotFound(format!("Retention task {}", task.id)))?;
        slot.1 = task.clone();
        Ok(())
    }

    async fn staff_is_active(&self, tenant_id: &str, staff_id: i64) -> RepoResult<bool> {
        Ok(self
            .lock()
            .staff
            .iter()
            .any(|(t, s)| t == tenant_id && s.id == staff_id && s.is_active))
    }
}

// ── Callers and tasks ───────────────────────────────────────────────

pub fn caller(role: Role) -> Caller {
    Caller {
        user_id: 900,
        tenant_id: TENANT.to_string(),
        role,
        member_id: None,
    }
}

pub fn member_caller(member_id: i64) -> Caller {
    Caller {
        member_id: Some(member_id),
        ..caller(Role::Member)
    }
}

pub fn staff_task(id: i64, member_id: i64, priority: i32, due_date: Option<i64>) -> RetentionTask {
    RetentionTask {
        id,
        member_id,
        assigned_to_id: None,
        status: TaskStatus::Open,
        priority,
        title: format!("Task {id}"),
        note: None,
        due_date,
        created_by_id: Some(900),
        resolved_at: None,
        created_at: days_ago(5) + id,
        updated_at: days_ago(5) + id,
    }
}

// ── HTTP ────────────────────────────────────────────────────────────

pub fn app(store: &MemoryStore) -> Router {
    let state = AppState::with_store(Arc::new(store.clone()), RetentionRules::default(), SECRET);
    create_router(state)
}

pub fn token_for(caller: &Caller) -> String {
    create_token(caller, SECRET, chrono::Duration::hours(1)).unwrap()
}

/// Send a request and decode the JSON body
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Error code carried by a failed service call
pub fn error_code(err: gym_cloud::error::ServiceError) -> shared::error::ErrorCode {
    shared::error::AppError::from(err).code
}
