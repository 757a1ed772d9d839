//! Caller authentication and authorization
//!
//! The JWT middleware turns a bearer token into a [`Caller`]; services check
//! every operation against [`policy::authorize`] with that caller.

pub mod policy;
pub mod tenant_auth;

pub use policy::{Action, authorize};
pub use tenant_auth::{CallerClaims, create_token, tenant_auth_middleware};

use shared::models::Role;

/// Authenticated caller extracted from the access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub tenant_id: String,
    pub role: Role,
    /// Member profile linked to the account (member role only)
    pub member_id: Option<i64>,
}
