//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, method check, body buffering)
//!     → routing::RequestRouter (forwarding strategy by method)
//!     → response.rs (relay, 502, or CORS fallback)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{read_inbound, InboundError, UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
