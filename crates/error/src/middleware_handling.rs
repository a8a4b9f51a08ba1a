use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::{AppError, ErrorResponse};

// Upper bound on a rejection body worth turning into a detail message
const REJECTION_BODY_LIMIT: usize = 64 * 1024;

/// Rewrites bare framework failures (extractor rejections, unknown routes,
/// oversized bodies, panics, timeouts) into the same `{detail}` body the
/// handlers produce.
pub async fn error_handling_middleware(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let method = req.method().clone();

    let response = next.run(req).await;

    let status = response.status();
    if is_json(&response) {
        return response;
    }

    if status == StatusCode::PAYLOAD_TOO_LARGE {
        error!("Request body too large: {}", status);
        return (
            status,
            axum::Json(ErrorResponse {
                detail: "The request body exceeds the maximum allowed size".to_string(),
            }),
        )
            .into_response();
    }

    if status == StatusCode::REQUEST_TIMEOUT {
        return (
            status,
            axum::Json(ErrorResponse {
                detail: "Request timed out".to_string(),
            }),
        )
            .into_response();
    }

    if status.is_server_error() {
        error!("Server error occurred: {}", status);
        return AppError::ServerError(anyhow::anyhow!("{} {} failed with {}", method, path, status))
            .into_response();
    }

    if status.is_client_error() {
        return rejection_to_detail(response).await;
    }

    response
}

// Extractor rejections carry a plain-text reason; empty bodies fall back to
// the canonical status text
async fn rejection_to_detail(response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    let status = parts.status;

    let text = match axum::body::to_bytes(body, REJECTION_BODY_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    let detail = if text.is_empty() {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    } else {
        text
    };

    parts.headers.remove(axum::http::header::CONTENT_TYPE);
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);

    let mut rewritten = (status, axum::Json(ErrorResponse { detail })).into_response();
    rewritten.headers_mut().extend(parts.headers);
    rewritten
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}
