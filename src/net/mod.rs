//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (parse address, bind, listen)
//!     → Hand the listener to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - A bind failure is the only fatal network error; everything after is per-request
//! - No TLS: the proxy serves plain HTTP to a local client

pub mod listener;

pub use listener::{bind, ListenerError};
