//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → retries.rs (run attempt, classify failure)
//!     → On retryable failure: backoff.rs (next interval), sleep, retry
//!     → On fatal failure or exhausted budget: RetryOutcome to the caller
//! ```
//!
//! # Design Decisions
//! - Every individual upstream operation carries its own timeout; the run as a whole has none
//! - Backoff is deterministic (no jitter): a single client is talking to a single device
//! - Retry state is an explicit value so the policy is testable without wall-clock delays

pub mod backoff;
pub mod retries;

pub use retries::{
    Attempt, Classify, ErrorClass, RetryExecutor, RetryOutcome, RetryPolicy, Sleeper, TokioSleeper,
};
