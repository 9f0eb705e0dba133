//! HTTP client forwarding for the GET and OPTIONS paths.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::Endpoint;
use crate::http::response::is_hop_by_hop;
use crate::routing::ForwardStrategy;
use crate::upstream::error::UpstreamError;
use crate::upstream::types::{HeaderList, InboundRequest, UpstreamResponse};

/// Forwards requests through a non-pooling hyper client with a whole-exchange deadline.
#[derive(Clone)]
pub struct HttpForwarder {
    endpoint: Endpoint,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));

        // Every attempt opens a fresh upstream connection.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            endpoint,
            client,
            timeout,
        }
    }

    fn build_request(&self, request: &InboundRequest) -> Result<Request<Body>, UpstreamError> {
        let mut builder = Request::builder()
            .method(request.method.to_http())
            .uri(self.endpoint.uri_for(&request.path));

        for (name, value) in &request.headers {
            if is_hop_by_hop(name)
                || name.eq_ignore_ascii_case("host")
                || name.eq_ignore_ascii_case("content-length")
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .header(header::HOST, self.endpoint.host_header())
            .body(Body::from(request.body.clone()))
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))
    }

    async fn exchange(&self, req: Request<Body>) -> Result<UpstreamResponse, UpstreamError> {
        let response = self
            .client
            .request(req)
            .await
            .map_err(|e| UpstreamError::from_client_error(&e))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .map_err(|e| UpstreamError::from_client_error(&e))?;

        Ok(UpstreamResponse {
            status: parts.status.as_u16(),
            headers: header_pairs(&parts.headers),
            body,
        })
    }
}

impl std::fmt::Debug for HttpForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpForwarder")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ForwardStrategy for HttpForwarder {
    async fn forward(&self, request: &InboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let req = self.build_request(request)?;
        tokio::time::timeout(self.timeout, self.exchange(req))
            .await
            .map_err(|_| UpstreamError::timeout("request", self.timeout))?
    }
}

/// Copy a header map into an ordered list, keeping repeated headers.
pub fn header_pairs(headers: &HeaderMap) -> HeaderList {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
