//! API routes for gym-cloud

pub mod health;
pub mod retention;

use axum::routing::{get, patch, post};
use axum::{Router, middleware};
use http::{HeaderName, HeaderValue};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::tenant_auth_middleware;
use crate::middleware::{envelope_middleware, logging_middleware};
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Retention API routes (JWT authenticated)
fn retention_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/retention/overview", get(retention::get_overview))
        .route("/api/retention/members", get(retention::list_members))
        .route(
            "/api/retention/members/{member_id}",
            get(retention::get_member_detail),
        )
        .route("/api/retention/recalculate", post(retention::recalculate))
        .route(
            "/api/retention/tasks",
            get(retention::list_tasks).post(retention::create_task),
        )
        .route("/api/retention/tasks/bulk", patch(retention::bulk_update_tasks))
        .route("/api/retention/tasks/{id}", patch(retention::update_task))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_auth_middleware,
        ))
}

/// Create the fully layered application router
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health_check))
        .merge(retention_router(&state))
        // Envelope - innermost, sees handler and auth output
        .layer(middleware::from_fn(envelope_middleware))
        // Compression - Gzip compress enveloped responses
        .layer(CompressionLayer::new())
        // Request logging
        .layer(middleware::from_fn(logging_middleware))
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        // Propagate request ID to response
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        // Request ID - Generate unique ID for each request
        .layer(SetRequestIdLayer::new(request_id, XRequestId))
        // CORS - Handle cross-origin requests
        .layer(CorsLayer::permissive())
        .with_state(state)
}
