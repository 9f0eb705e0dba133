//! Retry-aware forwarding proxy for a device on a restricted network segment.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observability::ErrorSink;
pub use routing::RequestRouter;
