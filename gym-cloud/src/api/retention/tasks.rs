//! Retention task endpoints: list, create, update, bulk update

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use http::StatusCode;
use serde::Deserialize;
use shared::error::AppError;
use shared::models::{
    BulkUpdateResult, RetentionTask, RetentionTaskBulkUpdate, RetentionTaskCreate,
    RetentionTaskUpdate,
};
use shared::response::{Page, PageRequest};
use shared::util::now_millis;

use crate::auth::{Action, Caller, authorize};
use crate::db::TaskFilter;
use crate::retention::tasks::{self, parse_status};
use crate::state::AppState;
use crate::validation::validate_priority;

use super::ApiResult;

/// GET /api/retention/tasks
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksQuery {
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub assigned_to_id: Option<i64>,
    pub member_id: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TasksQuery {
    fn filter(&self) -> Result<TaskFilter, AppError> {
        if let Some(priority) = self.priority {
            validate_priority(priority)?;
        }
        Ok(TaskFilter {
            status: self.status.as_deref().map(parse_status).transpose()?,
            priority: self.priority,
            assigned_to_id: self.assigned_to_id,
            member_id: self.member_id,
        })
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<TasksQuery>,
) -> ApiResult<Page<RetentionTask>> {
    // A caller without access gets 403 whatever the query holds
    authorize(&caller, Action::ListTasks)?;
    let filter = query.filter()?;
    let page = PageRequest::new(query.page, query.limit);
    let tasks = tasks::list_tasks(state.store.as_ref(), &caller, &filter, page).await?;
    Ok(Json(tasks))
}

/// POST /api/retention/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<RetentionTaskCreate>,
) -> Result<(StatusCode, Json<RetentionTask>), AppError> {
    let task = tasks::create_task(state.store.as_ref(), &caller, &payload, now_millis()).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /api/retention/tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(task_id): Path<i64>,
    Json(payload): Json<RetentionTaskUpdate>,
) -> ApiResult<RetentionTask> {
    let task =
        tasks::update_task(state.store.as_ref(), &caller, task_id, &payload, now_millis()).await?;
    Ok(Json(task))
}

/// PATCH /api/retention/tasks/bulk
pub async fn bulk_update_tasks(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<RetentionTaskBulkUpdate>,
) -> ApiResult<BulkUpdateResult> {
    let result = tasks::bulk_update(state.store.as_ref(), &caller, &payload, now_millis()).await?;
    Ok(Json(result))
}
