//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Hand every request to the `RequestRouter` and render its reply
//!
//! # Design Decisions
//! - One task per client connection; a request is handled start to finish in that task
//! - A client that disconnects mid-response only ends its own connection
//! - Dispatch runs in its own task, so a disconnect never cuts a retry run short

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{read_inbound, UuidRequestId};
use crate::observability::ErrorSink;
use crate::routing::RequestRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub max_body_bytes: usize,
}

/// HTTP server for the device proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig, sink: ErrorSink) -> Self {
        let state = AppState {
            router: Arc::new(RequestRouter::from_config(&config, sink)),
            max_body_bytes: config.limits.max_request_body_bytes,
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let inbound = match read_inbound(request, state.max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "Rejected inbound request");
            return e.into_response();
        }
    };

    tracing::debug!(
        peer = %peer,
        method = %inbound.method,
        path = %inbound.path,
        "Proxying request"
    );

    // The retry run outlives a client that disconnects; its reply is then discarded.
    let router = state.router.clone();
    let run = tokio::spawn(async move { router.dispatch(&inbound).await });

    match run.await {
        Ok(reply) => reply.into_response(),
        Err(e) => {
            tracing::error!(peer = %peer, error = %e, "Request worker failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
