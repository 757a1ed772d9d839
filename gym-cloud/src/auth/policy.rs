//! Role policy for retention operations
//!
//! Admin and staff work the retention dashboard; only admins may force an
//! evaluation; a member may read nothing but their own risk detail.

use shared::error::{AppError, ErrorCode};
use shared::models::Role;

use super::Caller;

/// Operation a caller asks to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewOverview,
    ListRisks,
    ViewMemberRisk { member_id: i64 },
    Recalculate,
    ListTasks,
    ManageTasks,
}

/// Whether `caller` may perform `action`
pub fn is_allowed(caller: &Caller, action: Action) -> bool {
    match (caller.role, action) {
        (Role::Admin, _) => true,
        (Role::Staff, Action::Recalculate) => false,
        (Role::Staff, _) => true,
        (Role::Member, Action::ViewMemberRisk { member_id }) => {
            caller.member_id == Some(member_id)
        }
        (Role::Member, _) => false,
    }
}

/// Fail with a 403 error unless `caller` may perform `action`
pub fn authorize(caller: &Caller, action: Action) -> Result<(), AppError> {
    if is_allowed(caller, action) {
        return Ok(());
    }

    tracing::warn!(
        user_id = caller.user_id,
        tenant_id = %caller.tenant_id,
        role = %caller.role,
        ?action,
        "Permission denied"
    );

    Err(match action {
        Action::Recalculate => AppError::new(ErrorCode::AdminRequired),
        _ => AppError::forbidden("Your role cannot perform this action")
            .with_detail("role", caller.role.as_str()),
    })
}
