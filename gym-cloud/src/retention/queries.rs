//! Retention dashboard queries

use shared::error::{AppError, ErrorCode};
use shared::models::{MemberRetentionDetail, RetentionMember, RetentionOverview, Role};
use shared::response::{Page, PageRequest};
use shared::util::DAY_MILLIS;

use crate::auth::{Action, Caller, authorize};
use crate::db::{RetentionStore, RiskFilter};
use crate::error::ServiceResult;

/// Tasks shown on the member drill-down
pub const RECENT_TASKS: u32 = 10;
/// Subscriptions shown on the member drill-down
pub const RECENT_SUBSCRIPTIONS: u32 = 5;

const NEW_HIGH_WINDOW_DAYS: i64 = 7;

/// Dashboard counters for the caller's tenant
pub async fn overview(
    store: &dyn RetentionStore,
    caller: &Caller,
    now: i64,
) -> ServiceResult<RetentionOverview> {
    authorize(caller, Action::ViewOverview)?;
    let since = now - NEW_HIGH_WINDOW_DAYS * DAY_MILLIS;
    Ok(store.overview(&caller.tenant_id, since).await?)
}

/// Page through risk snapshots, highest score first
pub async fn list_members(
    store: &dyn RetentionStore,
    caller: &Caller,
    filter: &RiskFilter,
    page: PageRequest,
) -> ServiceResult<Page<RetentionMember>> {
    authorize(caller, Action::ListRisks)?;
    let (items, total) = store.list_risks(&caller.tenant_id, filter, page).await?;
    Ok(Page::new(items, total, page))
}

/// One member's snapshot with recent tasks and subscriptions
///
/// Members reading their own detail do not see staff tasks.
pub async fn member_detail(
    store: &dyn RetentionStore,
    caller: &Caller,
    member_id: i64,
) -> ServiceResult<MemberRetentionDetail> {
    authorize(caller, Action::ViewMemberRisk { member_id })?;
    let tenant_id = caller.tenant_id.as_str();

    let member = store
        .find_member(tenant_id, member_id)
        .await?
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::MemberNotFound,
                format!("Member {member_id} not found"),
            )
            .with_detail("memberId", member_id)
        })?;

    let risk = store.find_risk(tenant_id, member_id).await?;
    let recent_subscriptions = store
        .recent_subscriptions(tenant_id, member_id, RECENT_SUBSCRIPTIONS)
        .await?;
    let recent_tasks = match caller.role {
        Role::Member => Vec::new(),
        Role::Admin | Role::Staff => {
            store
                .recent_tasks(tenant_id, member_id, RECENT_TASKS)
                .await?
        }
    };

    Ok(MemberRetentionDetail {
        member,
        risk,
        recent_tasks,
        recent_subscriptions,
    })
}
