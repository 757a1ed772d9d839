//! Member risk endpoints: ranked list, per-member drill-down

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{MemberRetentionDetail, RetentionMember, RiskLevel};
use shared::response::{Page, PageRequest};

use crate::auth::{Action, Caller, authorize};
use crate::db::RiskFilter;
use crate::retention::queries;
use crate::state::AppState;
use crate::validation::{MAX_SEARCH_LEN, validate_optional_text};

use super::ApiResult;

/// GET /api/retention/members
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersQuery {
    pub risk_level: Option<String>,
    pub min_score: Option<i32>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl MembersQuery {
    fn filter(&self) -> Result<RiskFilter, AppError> {
        let risk_level = self
            .risk_level
            .as_deref()
            .map(|raw| {
                raw.parse::<RiskLevel>().map_err(|_| {
                    AppError::new(ErrorCode::RiskLevelInvalid).with_detail("riskLevel", raw)
                })
            })
            .transpose()?;

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        validate_optional_text(search, "search", MAX_SEARCH_LEN)?;

        Ok(RiskFilter {
            risk_level,
            min_score: self.min_score,
            search: search.map(str::to_string),
        })
    }
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<MembersQuery>,
) -> ApiResult<Page<RetentionMember>> {
    authorize(&caller, Action::ListRisks)?;
    let filter = query.filter()?;
    let page = PageRequest::new(query.page, query.limit);
    let members = queries::list_members(state.store.as_ref(), &caller, &filter, page).await?;
    Ok(Json(members))
}

/// GET /api/retention/members/{member_id}
pub async fn get_member_detail(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(member_id): Path<i64>,
) -> ApiResult<MemberRetentionDetail> {
    let detail = queries::member_detail(state.store.as_ref(), &caller, member_id).await?;
    Ok(Json(detail))
}
