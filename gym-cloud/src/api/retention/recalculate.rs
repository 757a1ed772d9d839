//! POST /api/retention/recalculate

use axum::{Extension, Json, extract::State};
use shared::models::RecalculateSummary;
use shared::util::now_millis;

use crate::auth::Caller;
use crate::retention::evaluator;
use crate::state::AppState;

use super::ApiResult;

/// Evaluate the caller's tenant now and return the batch summary
pub async fn recalculate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<RecalculateSummary> {
    let summary =
        evaluator::recalculate(state.store.as_ref(), &state.rules, &caller, now_millis()).await?;
    Ok(Json(summary))
}
