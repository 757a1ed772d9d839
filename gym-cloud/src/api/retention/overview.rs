//! GET /api/retention/overview

use axum::{Extension, Json, extract::State};
use shared::models::RetentionOverview;
use shared::util::now_millis;

use crate::auth::Caller;
use crate::retention::queries;
use crate::state::AppState;

use super::ApiResult;

pub async fn get_overview(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<RetentionOverview> {
    let overview = queries::overview(state.store.as_ref(), &caller, now_millis()).await?;
    Ok(Json(overview))
}
