//! TCP listener setup.
//!
//! # Responsibilities
//! - Parse and bind the configured local address
//! - Report bind failures distinctly; they are fatal at startup
//!
//! # Design Decisions
//! - Binding is done here, serving is done by the HTTP layer
//! - The socket is created with SO_REUSEADDR so a restarted proxy can rebind at once

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address is not a socket address.
    #[error("Invalid bind address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

const BACKLOG: u32 = 1024;

/// Bind a listening socket on `address`.
pub fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|e: std::net::AddrParseError| ListenerError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    let bind_err = |source| ListenerError::Bind {
        address: addr,
        source,
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    let listener = socket.listen(BACKLOG).map_err(bind_err)?;

    let local_addr = listener.local_addr().map_err(bind_err)?;
    tracing::info!(address = %local_addr, "Listener bound");

    Ok(listener)
}
