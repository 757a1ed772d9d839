//! Response envelope middleware
//!
//! Wraps JSON bodies as `{data, statusCode, timestamp, path}`. Error bodies
//! (an [`ErrorBody`] from `AppError`, or plain-text extractor rejections)
//! become `{data: null, ..., error: {code, message, details}}`.

use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, header};
use serde_json::Value;
use shared::error::{ApiResponse, AppError, ErrorBody, ErrorCode};

/// Largest handler body the envelope will buffer
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub async fn envelope_middleware(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    wrap_response(response, &path).await
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Error code for a failure response that did not come from an `AppError`
fn fallback_code(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::UNAUTHORIZED => ErrorCode::NotAuthenticated,
        StatusCode::FORBIDDEN => ErrorCode::PermissionDenied,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorCode::TimeoutError,
        s if s.is_server_error() => ErrorCode::InternalError,
        _ => ErrorCode::InvalidRequest,
    }
}

fn fallback_error(status: StatusCode, body: &[u8]) -> ErrorBody {
    let code = fallback_code(status);
    let text = String::from_utf8_lossy(body).trim().to_string();
    let message = if text.is_empty() || status.is_server_error() {
        status
            .canonical_reason()
            .unwrap_or(code.message())
            .to_string()
    } else {
        text
    };
    ErrorBody {
        code: code.code(),
        message,
        details: None,
    }
}

fn json_response(mut parts: http::response::Parts, body: Vec<u8>) -> Response {
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body))
}

async fn wrap_response(response: Response, path: &str) -> Response {
    let status = response.status();
    let json = is_json(&response);

    // Non-JSON success bodies (empty, plain text) pass through untouched
    if status.is_success() && !json {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(path, error = %e, "Failed to buffer response body");
            return AppError::internal("Failed to render response").into_response();
        }
    };

    let encoded = if status.is_success() {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(data) => serde_json::to_vec(&ApiResponse::success(data, status, path)),
            Err(_) => return Response::from_parts(parts, Body::from(bytes)),
        }
    } else {
        let error = json
            .then(|| serde_json::from_slice::<ErrorBody>(&bytes).ok())
            .flatten()
            .unwrap_or_else(|| fallback_error(status, &bytes));
        serde_json::to_vec(&ApiResponse::<Value>::failure(error, status, path))
    };

    match encoded {
        Ok(body) => json_response(parts, body),
        Err(e) => {
            tracing::error!(path, error = %e, "Failed to encode response envelope");
            AppError::internal("Failed to render response").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn envelope_of(response: Response, path: &str) -> (StatusCode, Value) {
        let wrapped = wrap_response(response, path).await;
        let status = wrapped.status();
        let bytes = axum::body::to_bytes(wrapped.into_body(), MAX_BODY_BYTES)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_wraps_json_success() {
        let response = axum::Json(serde_json::json!({"highRisk": 3})).into_response();
        let (status, body) = envelope_of(response, "/api/retention/overview").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["highRisk"], 3);
        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["path"], "/api/retention/overview");
        assert!(body["timestamp"].is_string());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_wraps_app_error() {
        let response = AppError::new(ErrorCode::RetentionTaskNotFound).into_response();
        let (status, body) = envelope_of(response, "/api/retention/tasks/1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["data"].is_null());
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["error"]["code"], 4001);
    }

    #[tokio::test]
    async fn test_wraps_plain_text_rejection() {
        let response = (StatusCode::UNPROCESSABLE_ENTITY, "missing field `taskIds`").into_response();
        let (status, body) = envelope_of(response, "/api/retention/tasks/bulk").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], ErrorCode::InvalidRequest.code());
        assert_eq!(body["error"]["message"], "missing field `taskIds`");
    }

    #[tokio::test]
    async fn test_empty_not_found_gets_reason() {
        let response = StatusCode::NOT_FOUND.into_response();
        let (_, body) = envelope_of(response, "/nope").await;
        assert_eq!(body["error"]["code"], ErrorCode::NotFound.code());
        assert_eq!(body["error"]["message"], "Not Found");
    }

    #[tokio::test]
    async fn test_plain_text_success_passes_through() {
        let response = "ok".into_response();
        let wrapped = wrap_response(response, "/health").await;
        let bytes = axum::body::to_bytes(wrapped.into_body(), MAX_BODY_BYTES)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ok");
    }
}
