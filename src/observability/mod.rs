//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured console events via tracing)
//!     → error_sink.rs (durable, timestamped failure records)
//!
//! Consumers:
//!     → Developer console (stderr), unless quiet
//!     → Error log file, always
//! ```
//!
//! # Design Decisions
//! - Console and durable log are independent: quiet mode only affects the console
//! - Request ID flows through request spans (tower-http TraceLayer)

pub mod error_sink;
pub mod logging;

pub use error_sink::ErrorSink;
