//! Startup orchestration.
//!
//! # Responsibilities
//! - Mark a fresh run in the error log
//! - Bind the listener, recording a fatal line if that fails
//! - Build the HTTP server and run it until shutdown
//!
//! # Design Decisions
//! - Fail fast: a bind failure is returned to `main`, which exits non-zero
//! - The listener binds before any request can be routed

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{self, ListenerError};
use crate::observability::ErrorSink;

/// Errors that end the process.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bind and serve with `config` until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let sink = ErrorSink::from_config(&config.logging);

    // Always written, even in quiet mode.
    let banner = format!(
        "HTTP Proxy starting on http://{} -> http://{}",
        config.listener.bind_address, config.upstream
    );
    if let Err(e) = sink.start_run(&banner).await {
        tracing::warn!(path = %sink.path().display(), error = %e, "Failed to write error log");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream,
        max_attempts = config.retries.max_attempts,
        initial_backoff_ms = config.retries.initial_backoff_ms,
        error_log = %sink.path().display(),
        "Configuration loaded"
    );

    let listener = match net::bind(&config.listener.bind_address) {
        Ok(listener) => listener,
        Err(e) => {
            let _ = sink.try_record(&format!("FATAL: {}", e)).await;
            tracing::error!(error = %e, "Failed to start proxy");
            return Err(e.into());
        }
    };

    let local_addr = listener.local_addr()?;
    let _ = sink
        .try_record(&format!("Proxy successfully bound to {}", local_addr))
        .await;

    let server = HttpServer::new(config, sink);
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_failure_is_recorded_and_returned() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();

        let mut config = ProxyConfig::default();
        config.listener.bind_address = taken.local_addr().unwrap().to_string();
        config.logging.error_log = dir.path().join("proxy_errors.log");
        config.logging.quiet = true;

        let err = run(config.clone(), &Shutdown::new()).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind(_)));

        let log = std::fs::read_to_string(&config.logging.error_log).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("HTTP Proxy starting on"));
        assert!(lines[1].contains("FATAL: Failed to bind to"));
    }

    #[tokio::test]
    async fn successful_start_truncates_old_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("proxy_errors.log");
        std::fs::write(&log_path, "stale line\n").unwrap();

        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.logging.error_log = log_path.clone();
        config.logging.quiet = true;

        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.trigger();
        });

        run(config, &shutdown).await.unwrap();

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(!log.contains("stale line"));
        assert!(log.lines().nth(1).unwrap().contains("Proxy successfully bound to 127.0.0.1:"));
    }
}
