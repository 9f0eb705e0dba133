//! Upstream failure taxonomy and retry classification.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::{Classify, ErrorClass};
use crate::upstream::framer::FrameError;

/// Errors that can occur during a single forwarding attempt.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// TCP connection to the device could not be established.
    #[error("connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// The device could not be reached by the HTTP client.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    /// A single network operation exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Socket-level failure after the connection was established.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// The raw response could not be delimited or parsed.
    #[error("invalid HTTP response: {0}")]
    Framing(#[from] FrameError),

    /// The HTTP client rejected the exchange for a non-network reason.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The outbound request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Classify for UpstreamError {
    fn class(&self) -> ErrorClass {
        match self {
            UpstreamError::Connect { .. }
            | UpstreamError::Unreachable(_)
            | UpstreamError::Timeout { .. }
            | UpstreamError::Io(_) => ErrorClass::Retryable,
            UpstreamError::Framing(_)
            | UpstreamError::Protocol(_)
            | UpstreamError::InvalidRequest(_) => ErrorClass::NonRetryable,
        }
    }
}

impl UpstreamError {
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        UpstreamError::Timeout { operation, after }
    }

    /// Map an HTTP client or body error onto the taxonomy.
    ///
    /// Connect failures, dropped connections and transient socket errors anywhere in the
    /// source chain are network failures; everything else is a protocol failure.
    pub fn from_client_error(err: &(dyn StdError + 'static)) -> Self {
        let message = error_chain_message(err);
        if is_transient(err) {
            UpstreamError::Unreachable(message)
        } else {
            UpstreamError::Protocol(message)
        }
    }
}

/// Transient io error kinds: refused, reset, unreachable, timed out.
pub fn is_transient_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::UnexpectedEof
    ) || matches!(err.raw_os_error(), Some(code) if is_unreachable_os_code(code))
}

#[cfg(unix)]
fn is_unreachable_os_code(code: i32) -> bool {
    // ENETUNREACH / EHOSTUNREACH / EHOSTDOWN
    #[cfg(target_os = "linux")]
    const CODES: [i32; 3] = [101, 113, 112];
    #[cfg(not(target_os = "linux"))]
    const CODES: [i32; 3] = [51, 65, 64];
    CODES.contains(&code)
}

#[cfg(not(unix))]
fn is_unreachable_os_code(_code: i32) -> bool {
    false
}

fn is_transient(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(client) = e.downcast_ref::<hyper_util::client::legacy::Error>() {
            if client.is_connect() {
                return true;
            }
        }
        if let Some(h) = e.downcast_ref::<hyper::Error>() {
            if h.is_incomplete_message() || h.is_timeout() || h.is_closed() || h.is_canceled() {
                return true;
            }
        }
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if is_transient_io(io) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn error_chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = e.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_retryable() {
        let refused = UpstreamError::Connect {
            endpoint: "10.0.0.1:80".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(refused.is_retryable());
        assert!(UpstreamError::timeout("read", Duration::from_secs(10)).is_retryable());
        assert!(UpstreamError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).is_retryable());
    }

    #[test]
    fn framing_failures_are_fatal() {
        let err = UpstreamError::Framing(FrameError::ClosedBeforeHeaders { received: 12 });
        assert_eq!(err.class(), ErrorClass::NonRetryable);
        assert!(!UpstreamError::Protocol("bad".into()).is_retryable());
    }

    #[test]
    fn client_errors_are_classified_through_the_source_chain() {
        #[derive(Debug, Error)]
        #[error("request failed")]
        struct Wrapper(#[source] io::Error);

        let transient = Wrapper(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(UpstreamError::from_client_error(&transient).is_retryable());

        let other = Wrapper(io::Error::new(io::ErrorKind::InvalidData, "garbage"));
        let err = UpstreamError::from_client_error(&other);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("garbage"));
    }

    #[test]
    fn timeout_message_names_the_operation() {
        let err = UpstreamError::timeout("connect", Duration::from_secs(10));
        assert_eq!(err.to_string(), "connect timed out after 10s");
    }
}
