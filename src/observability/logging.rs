//! Structured console logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Map the configured level and quiet mode onto an `EnvFilter`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` always wins over the configured level
//! - Quiet mode silences the console entirely; the error log file is unaffected

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Default filter directive for `config`.
pub fn default_directive(config: &LoggingConfig) -> String {
    if config.quiet {
        "off".to_string()
    } else {
        format!("device_proxy={level},tower_http={level}", level = config.level)
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_mode_turns_console_off() {
        let mut config = LoggingConfig::default();
        assert_eq!(default_directive(&config), "device_proxy=info,tower_http=info");

        config.quiet = true;
        assert_eq!(default_directive(&config), "off");
    }
}
