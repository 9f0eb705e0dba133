//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → client.rs (GET/OPTIONS: hyper client, fresh connection per attempt)
//!     → raw.rs    (POST: TcpStream + framer.rs request/response framing)
//!     → UpstreamResponse | UpstreamError (classified Retryable / NonRetryable)
//! ```
//!
//! # Design Decisions
//! - One attempt per call; retrying belongs to the router's executor
//! - Each network operation carries its own deadline
//! - Responses are fully buffered so a failed attempt never leaks a partial reply

pub mod client;
pub mod error;
pub mod framer;
pub mod raw;
pub mod types;

pub use client::HttpForwarder;
pub use error::UpstreamError;
pub use framer::FrameError;
pub use raw::RawForwarder;
pub use types::{HeaderList, InboundRequest, Method, UpstreamResponse};
