//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Mark new run in error log → Bind listener → Build server → Serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Server stops accepting → In-flight requests finish → Exit
//!
//! Signals (signals.rs):
//!     SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then log, then listener
//! - Bind failure is fatal; per-request failures never are

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::StartupError;
