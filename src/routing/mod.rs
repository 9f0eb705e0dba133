//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → router.rs (select strategy by method)
//!         GET     → HttpForwarder  under the retry policy
//!         POST    → RawForwarder   under the retry policy
//!         OPTIONS → HttpForwarder  single attempt, CORS fallback
//!     → Reply (relay, 502, or synthesized preflight answer)
//! ```
//!
//! # Design Decisions
//! - Strategies are independent components held by the router, not a handler hierarchy
//! - The router never touches sockets on the client side; `http::response` renders replies

use std::future::Future;

use crate::upstream::{InboundRequest, UpstreamError, UpstreamResponse};

pub mod router;

pub use router::{Reply, RequestRouter};

/// One way of delivering a request to the upstream device.
pub trait ForwardStrategy: Send + Sync {
    /// Make exactly one attempt.
    fn forward(
        &self,
        request: &InboundRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send;
}
