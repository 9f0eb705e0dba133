//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Reject methods the proxy does not forward
//! - Enforce the body size limit and buffer the body
//! - Convert the axum request into an `InboundRequest`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Declared body size checked before the body is read

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::upstream::client::header_pairs;
use crate::upstream::{InboundRequest, Method};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Reasons an inbound request is refused before forwarding.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("method {0} is not supported")]
    MethodNotAllowed(axum::http::Method),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Body(String),
}

impl IntoResponse for InboundError {
    fn into_response(self) -> Response {
        let status = match self {
            InboundError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            InboundError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            InboundError::Body(_) => StatusCode::BAD_REQUEST,
        };
        let mut response = (status, self.to_string()).into_response();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, POST, OPTIONS"));
        }
        response
    }
}

/// Buffer `request` into an `InboundRequest`.
pub async fn read_inbound(
    request: Request<Body>,
    max_body_bytes: usize,
) -> Result<InboundRequest, InboundError> {
    let method = Method::try_from(request.method()).map_err(InboundError::MethodNotAllowed)?;

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_body_bytes) {
        return Err(InboundError::BodyTooLarge {
            limit: max_body_bytes,
        });
    }

    let (parts, body) = request.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| InboundError::Body(e.to_string()))?;

    Ok(InboundRequest {
        method,
        path,
        headers: header_pairs(&parts.headers),
        body,
    })
}
