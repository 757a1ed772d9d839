//! Tenant JWT authentication for the retention API

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::models::Role;

use super::Caller;
use crate::state::AppState;

/// JWT claims issued by the platform's identity service
#[derive(Debug, Serialize, Deserialize)]
pub struct CallerClaims {
    /// User ID
    pub sub: String,
    /// Gym (tenant) the user belongs to
    pub tenant_id: String,
    pub role: Role,
    /// Linked member profile (member role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<i64>,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Create a JWT for a caller, valid for `ttl`
pub fn create_token(
    caller: &Caller,
    secret: &str,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = CallerClaims {
        sub: caller.user_id.to_string(),
        tenant_id: caller.tenant_id.clone(),
        role: caller.role,
        member_id: caller.member_id,
        exp: (now + ttl).timestamp().max(0) as usize,
        iat: now.timestamp().max(0) as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a token and build the caller it describes
pub fn verify_token(token: &str, secret: &str) -> Result<Caller, AppError> {
    let token_data = jsonwebtoken::decode::<CallerClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;

    let claims = token_data.claims;
    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::invalid_token("Token subject is not a user id"))?;
    if claims.tenant_id.is_empty() {
        return Err(AppError::invalid_token("Token carries no tenant"));
    }

    Ok(Caller {
        user_id,
        tenant_id: claims.tenant_id,
        role: claims.role,
        member_id: claims.member_id,
    })
}

/// Middleware that extracts and verifies the JWT from the Authorization header
///
/// Inserts the [`Caller`] into request extensions, and into response
/// extensions so the request logger can attribute the call.
pub async fn tenant_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AppError::unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format"))?;

    let caller = verify_token(token, &state.jwt_secret)?;

    request.extensions_mut().insert(caller.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(caller);
    Ok(response)
}
