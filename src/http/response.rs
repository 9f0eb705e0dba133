//! Response handling and transformation.
//!
//! # Responsibilities
//! - Render router replies as client responses
//! - Relay upstream status, headers and body unmodified
//! - Synthesize the 502 and CORS preflight fallback responses
//!
//! # Design Decisions
//! - Hop-by-hop headers from the upstream are dropped; the proxy frames its own connection
//! - `Content-Length` always matches the body actually delivered

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::routing::Reply;
use crate::upstream::UpstreamResponse;

/// Headers that describe a single connection rather than the message.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Relay(upstream) => relay(upstream),
            Reply::BadGateway(message) => bad_gateway(message),
            Reply::CorsFallback => cors_fallback(),
        }
    }
}

/// Turn an upstream response into a client response.
pub fn relay(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let body_len = upstream.body.len();

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &upstream.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!(header = %name, "Dropping unrepresentable upstream header");
            continue;
        };
        if name == header::CONTENT_LENGTH {
            if value.to_str().ok().and_then(|v| v.parse::<usize>().ok()) != Some(body_len) {
                tracing::warn!(
                    advertised = ?value,
                    delivered = body_len,
                    "Upstream body length differs from Content-Length"
                );
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_len));
            continue;
        }
        headers.append(name, value);
    }

    response
}

/// 502 naming the upstream target and the classified error.
pub fn bad_gateway(message: String) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}

/// Permissive answer for a preflight the upstream could not answer.
pub fn cors_fallback() -> Response {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
        .into_response()
}
