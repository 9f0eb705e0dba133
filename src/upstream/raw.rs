//! Raw-socket forwarding for requests that need explicit framing.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::Endpoint;
use crate::routing::ForwardStrategy;
use crate::upstream::error::UpstreamError;
use crate::upstream::framer::{encode_request, read_response, ReadOptions};
use crate::upstream::types::{InboundRequest, UpstreamResponse};

/// Forwards one request per fresh TCP connection using hand-built HTTP/1.0 framing.
#[derive(Debug, Clone)]
pub struct RawForwarder {
    endpoint: Endpoint,
    timeout: Duration,
    max_header_bytes: usize,
}

impl RawForwarder {
    /// `timeout` bounds the connect, the write and every individual read.
    pub fn new(endpoint: Endpoint, timeout: Duration, max_header_bytes: usize) -> Self {
        Self {
            endpoint,
            timeout,
            max_header_bytes,
        }
    }

    async fn connect(&self) -> Result<TcpStream, UpstreamError> {
        let address = (self.endpoint.host.as_str(), self.endpoint.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(UpstreamError::Connect {
                endpoint: self.endpoint.to_string(),
                source,
            }),
            Err(_) => Err(UpstreamError::timeout("connect", self.timeout)),
        }
    }
}

impl ForwardStrategy for RawForwarder {
    async fn forward(&self, request: &InboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let mut stream = self.connect().await?;

        let bytes = encode_request(request, &self.endpoint);
        tokio::time::timeout(self.timeout, stream.write_all(&bytes))
            .await
            .map_err(|_| UpstreamError::timeout("write", self.timeout))??;

        let options = ReadOptions {
            read_timeout: self.timeout,
            max_header_bytes: self.max_header_bytes,
        };
        read_response(&mut stream, options).await
    }
}
