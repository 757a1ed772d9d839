//! Retention task manager
//!
//! Staff-facing CRUD over follow-up tasks. Every operation takes the
//! authenticated [`Caller`] and is scoped to the caller's tenant.

use std::collections::HashSet;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    BulkUpdateResult, RetentionTask, RetentionTaskBulkUpdate, RetentionTaskCreate,
    RetentionTaskUpdate, TASK_PRIORITY_DEFAULT, TaskStatus,
};
use shared::response::{Page, PageRequest};
use shared::util::snowflake_id;

use crate::auth::{Action, Caller, authorize};
use crate::db::{RetentionStore, TaskFilter};
use crate::error::ServiceResult;
use crate::validation::{
    MAX_NOTE_LEN, MAX_TITLE_LEN, validate_optional_text, validate_priority,
    validate_required_text,
};

/// Upper bound on task ids in one bulk update
pub const MAX_BULK_TASKS: usize = 100;

/// Parse a task status, mapping unknown text to a 400 error
pub fn parse_status(raw: &str) -> Result<TaskStatus, AppError> {
    raw.parse().map_err(|_| {
        AppError::new(ErrorCode::RetentionTaskInvalidStatus).with_detail("status", raw)
    })
}

fn task_not_found(task_id: i64) -> AppError {
    AppError::with_message(
        ErrorCode::RetentionTaskNotFound,
        format!("Retention task {task_id} not found"),
    )
    .with_detail("id", task_id)
}

/// Validated partial update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub priority: Option<i32>,
    /// `Some(None)` unassigns
    pub assigned_to_id: Option<Option<i64>>,
    /// `Some("")` clears the note
    pub note: Option<String>,
    /// `Some(None)` clears the due date
    pub due_date: Option<Option<i64>>,
}

impl TaskPatch {
    /// Validate an update payload; at least one field must be present
    pub fn parse(update: &RetentionTaskUpdate) -> Result<Self, AppError> {
        if update.status.is_none()
            && update.priority.is_none()
            && update.assigned_to_id.is_none()
            && update.note.is_none()
            && update.due_date.is_none()
        {
            return Err(AppError::new(ErrorCode::RetentionTaskEmptyUpdate));
        }

        let status = update.status.as_deref().map(parse_status).transpose()?;
        if let Some(priority) = update.priority {
            validate_priority(priority)?;
        }
        validate_optional_text(update.note.as_deref(), "note", MAX_NOTE_LEN)?;

        Ok(Self {
            status,
            priority: update.priority,
            assigned_to_id: update.assigned_to_id,
            note: update.note.as_ref().map(|n| n.trim().to_string()),
            due_date: update.due_date,
        })
    }

    /// Apply to a task, maintaining `resolved_at`
    ///
    /// Entering DONE/DISMISSED stamps `now` unless the task was already
    /// terminal; OPEN/IN_PROGRESS clears the stamp.
    pub fn apply(&self, task: &RetentionTask, now: i64) -> RetentionTask {
        let mut next = task.clone();

        if let Some(status) = self.status {
            next.resolved_at = if !status.is_terminal() {
                None
            } else if task.status.is_terminal() {
                task.resolved_at.or(Some(now))
            } else {
                Some(now)
            };
            next.status = status;
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(assigned_to_id) = self.assigned_to_id {
            next.assigned_to_id = assigned_to_id;
        }
        if let Some(note) = &self.note {
            next.note = (!note.is_empty()).then(|| note.clone());
        }
        if let Some(due_date) = self.due_date {
            next.due_date = due_date;
        }
        next.updated_at = now;
        next
    }
}

async fn ensure_assignee(
    store: &dyn RetentionStore,
    tenant_id: &str,
    assigned_to_id: Option<i64>,
) -> ServiceResult<()> {
    if let Some(staff_id) = assigned_to_id
        && !store.staff_is_active(tenant_id, staff_id).await?
    {
        return Err(AppError::with_message(
            ErrorCode::StaffNotFound,
            format!("Staff {staff_id} not found or inactive"),
        )
        .with_detail("assignedToId", staff_id)
        .into());
    }
    Ok(())
}

/// List tasks of the caller's tenant
pub async fn list_tasks(
    store: &dyn RetentionStore,
    caller: &Caller,
    filter: &TaskFilter,
    page: PageRequest,
) -> ServiceResult<Page<RetentionTask>> {
    authorize(caller, Action::ListTasks)?;
    let (items, total) = store.list_tasks(&caller.tenant_id, filter, page).await?;
    Ok(Page::new(items, total, page))
}

/// Create a staff task for a member
pub async fn create_task(
    store: &dyn RetentionStore,
    caller: &Caller,
    payload: &RetentionTaskCreate,
    now: i64,
) -> ServiceResult<RetentionTask> {
    authorize(caller, Action::ManageTasks)?;

    validate_required_text(&payload.title, "title", MAX_TITLE_LEN)?;
    validate_optional_text(payload.note.as_deref(), "note", MAX_NOTE_LEN)?;
    let priority = payload.priority.unwrap_or(TASK_PRIORITY_DEFAULT);
    validate_priority(priority)?;

    let tenant_id = caller.tenant_id.as_str();
    if store.find_member(tenant_id, payload.member_id).await?.is_none() {
        return Err(AppError::with_message(
            ErrorCode::MemberNotFound,
            format!("Member {} not found", payload.member_id),
        )
        .into());
    }
    ensure_assignee(store, tenant_id, payload.assigned_to_id).await?;

    let task = RetentionTask {
        id: snowflake_id(),
        member_id: payload.member_id,
        assigned_to_id: payload.assigned_to_id,
        status: TaskStatus::Open,
        priority,
        title: payload.title.trim().to_string(),
        note: payload
            .note
            .as_ref()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        due_date: payload.due_date,
        created_by_id: Some(caller.user_id),
        resolved_at: None,
        created_at: now,
        updated_at: now,
    };

    if !store.insert_task(tenant_id, &task).await? {
        return Err(AppError::new(ErrorCode::AlreadyExists).into());
    }

    tracing::info!(
        tenant_id,
        task_id = task.id,
        member_id = task.member_id,
        user_id = caller.user_id,
        "Retention task created"
    );
    Ok(task)
}

/// Update one task
pub async fn update_task(
    store: &dyn RetentionStore,
    caller: &Caller,
    task_id: i64,
    update: &RetentionTaskUpdate,
    now: i64,
) -> ServiceResult<RetentionTask> {
    authorize(caller, Action::ManageTasks)?;
    let patch = TaskPatch::parse(update)?;
    let tenant_id = caller.tenant_id.as_str();
    ensure_assignee(store, tenant_id, patch.assigned_to_id.flatten()).await?;

    let task = store
        .find_task(tenant_id, task_id)
        .await?
        .ok_or_else(|| task_not_found(task_id))?;

    let updated = patch.apply(&task, now);
    store.update_task(tenant_id, &updated).await?;

    tracing::info!(
        tenant_id,
        task_id,
        status = %updated.status,
        user_id = caller.user_id,
        "Retention task updated"
    );
    Ok(updated)
}

/// Apply one patch to many tasks
///
/// The patch is validated once up front. Missing ids are reported in
/// `not_found`; the call succeeds even when none exist.
pub async fn bulk_update(
    store: &dyn RetentionStore,
    caller: &Caller,
    bulk: &RetentionTaskBulkUpdate,
    now: i64,
) -> ServiceResult<BulkUpdateResult> {
    authorize(caller, Action::ManageTasks)?;

    if bulk.task_ids.is_empty() {
        return Err(AppError::new(ErrorCode::BulkUpdateEmpty).into());
    }
    if bulk.task_ids.len() > MAX_BULK_TASKS {
        return Err(AppError::new(ErrorCode::BulkUpdateTooLarge)
            .with_detail("max", MAX_BULK_TASKS)
            .with_detail("count", bulk.task_ids.len())
            .into());
    }

    let patch = TaskPatch::parse(&bulk.update)?;
    let tenant_id = caller.tenant_id.as_str();
    ensure_assignee(store, tenant_id, patch.assigned_to_id.flatten()).await?;

    let mut seen = HashSet::new();
    let mut result = BulkUpdateResult {
        updated: 0,
        not_found: Vec::new(),
        tasks: Vec::new(),
    };

    for &task_id in bulk.task_ids.iter().filter(|id| seen.insert(**id)) {
        match store.find_task(tenant_id, task_id).await? {
            Some(task) => {
                let updated = patch.apply(&task, now);
                store.update_task(tenant_id, &updated).await?;
                result.tasks.push(updated);
            }
            None => result.not_found.push(task_id),
        }
    }
    result.updated = result.tasks.len();

    tracing::info!(
        tenant_id,
        updated = result.updated,
        not_found = result.not_found.len(),
        user_id = caller.user_id,
        "Retention tasks bulk updated"
    );
    Ok(result)
}
