//! Retry logic.
//!
//! # Responsibilities
//! - Run an operation until it succeeds, fails fatally, or the retry budget is spent
//! - Sleep with exponential backoff between retryable failures
//! - Report the outcome as an explicit `RetryOutcome`
//!
//! # Design Decisions
//! - Only failures classified `Retryable` are retried; `NonRetryable` ends the run at once
//! - The backoff interval is never consulted after the final attempt
//! - Sleeping goes through the `Sleeper` trait so tests run without real delays

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::Backoff;

/// Whether re-attempting a failed operation is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

/// Errors that know their own retry classification.
pub trait Classify {
    fn class(&self) -> ErrorClass;

    fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// Source of backoff delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(delay)
    }
}

/// State handed to the operation for one attempt.
///
/// Attempts are numbered from 0; attempt 0 is the first call and attempt `n` is the
/// `n`th retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    /// Retry budget of the run. The attempt numbered `max_attempts` is the last one.
    pub max_attempts: u32,
    /// Interval that will be slept if this attempt fails retryably.
    pub backoff: Duration,
}

impl Attempt {
    pub fn is_last(&self) -> bool {
        self.number >= self.max_attempts
    }
}

/// Result of a full retry run.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success(T),
    /// The first call and every retry failed with a retryable error.
    ExhaustedRetries { retries: u32, last_error: E },
    /// The attempt with this number failed with a non-retryable error.
    FatalError { attempt: u32, error: E },
}

impl<T, E> RetryOutcome<T, E> {
    /// Number of calls made before the run ended, if it failed.
    pub fn failed_calls(&self) -> Option<u32> {
        match self {
            RetryOutcome::Success(_) => None,
            RetryOutcome::ExhaustedRetries { retries, .. } => Some(retries + 1),
            RetryOutcome::FatalError { attempt, .. } => Some(attempt + 1),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryOutcome::Success(value) => Ok(value),
            RetryOutcome::ExhaustedRetries { last_error, .. } => Err(last_error),
            RetryOutcome::FatalError { error, .. } => Err(error),
        }
    }
}

/// Retry budget and backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.multiplier,
        }
    }
}

/// Runs operations under a `RetryPolicy`.
#[derive(Debug, Clone)]
pub struct RetryExecutor<S = TokioSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl RetryExecutor<TokioSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, TokioSleeper)
    }
}

impl<S: Sleeper> RetryExecutor<S> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Run `operation` until it succeeds, fails fatally, or the attempt numbered
    /// `max_attempts` has failed.
    ///
    /// Attempts are strictly sequential. A zero `max_attempts` makes a single call.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let max_attempts = self.policy.max_attempts;
        let mut backoff = Backoff::new(self.policy.initial_backoff, self.policy.multiplier);
        let mut number = 0;

        loop {
            let attempt = Attempt {
                number,
                max_attempts,
                backoff: backoff.current(),
            };

            let error = match operation(attempt).await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                return RetryOutcome::FatalError {
                    attempt: number,
                    error,
                };
            }

            if attempt.is_last() {
                return RetryOutcome::ExhaustedRetries {
                    retries: number,
                    last_error: error,
                };
            }

            tracing::info!(
                attempt = number,
                max_attempts,
                delay = ?attempt.backoff,
                error = %error,
                "Retrying after transient failure"
            );
            self.sleeper.sleep(attempt.backoff).await;
            backoff.advance();
            number += 1;
        }
    }
}
