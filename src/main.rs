//! Device Proxy
//!
//! Forwards a client-reachable local port to a device that is only reachable on a
//! restricted network segment (e.g. an emulated board behind a tunnel).
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                   DEVICE PROXY                     │
//!     Client Request     │  ┌─────────┐    ┌─────────┐    ┌──────────────┐   │
//!     ───────────────────┼─▶│   net   │───▶│  http   │───▶│   routing    │   │
//!                        │  │listener │    │ server  │    │ by method    │   │
//!                        │  └─────────┘    └─────────┘    └──────┬───────┘   │
//!                        │                                        │           │
//!                        │                       ┌────────────────┼────────┐  │
//!                        │                       ▼                ▼        │  │
//!                        │                ┌────────────┐   ┌────────────┐  │  │
//!                        │                │ GET/OPTIONS│   │ POST raw   │  │  │
//!                        │                │ hyper      │   │ framing    │──┼──┼──▶ Device
//!                        │                └────────────┘   └────────────┘  │  │
//!                        │                   resilience: retry + backoff ──┘  │
//!                        │                                                    │
//!                        │  observability: tracing console + error log file   │
//!                        └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use device_proxy::config::{self, Endpoint, ProxyConfig};
use device_proxy::lifecycle::{signals, startup, Shutdown, StartupError};
use device_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "device-proxy")]
#[command(about = "Forward a local port to a device with retries and backoff", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only write errors to the log file
    #[arg(short, long)]
    quiet: bool,

    /// Local bind address, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    bind: Option<String>,

    /// Upstream device as host[:port]
    #[arg(short, long)]
    upstream: Option<Endpoint>,
}

impl Cli {
    fn load(&self) -> Result<ProxyConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => ProxyConfig::default(),
        };

        if self.quiet {
            config.logging.quiet = true;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(upstream) = &self.upstream {
            config.upstream = upstream.clone();
        }

        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("device-proxy: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init(&config.logging);
    tracing::info!("device-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_on_ctrl_c(&signal_shutdown).await;
    });

    match startup::run(config, &shutdown).await {
        Ok(()) => {
            tracing::info!("Proxy stopped");
            ExitCode::SUCCESS
        }
        Err(StartupError::Bind(_)) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Proxy terminated");
            ExitCode::FAILURE
        }
    }
}
