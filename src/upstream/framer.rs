//! Hand-built HTTP/1.0 framing over a bare stream.
//!
//! Used by the POST path, where the device needs an exact `Content-Length` and
//! `Connection: close` on the request. Responses are delimited either by
//! `Content-Length` or by the peer closing the connection; chunked transfer-encoding
//! is not understood.

use std::time::Duration;

use axum::body::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Endpoint;
use crate::upstream::error::UpstreamError;
use crate::upstream::types::{HeaderList, InboundRequest, UpstreamResponse};

pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

const HEADER_READ_CHUNK: usize = 1024;
const BODY_READ_CHUNK: usize = 4096;

/// Framing violations in a raw response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("connection closed before headers received ({received} bytes read)")]
    ClosedBeforeHeaders { received: usize },

    #[error("response headers exceed {limit} bytes")]
    HeadersTooLarge { limit: usize },

    #[error("malformed status line '{0}'")]
    MalformedStatusLine(String),

    #[error("invalid Content-Length '{0}'")]
    InvalidContentLength(String),
}

/// Serialize `request` as an HTTP/1.0 request addressed to `endpoint`.
///
/// Only `Host`, `Content-Type`, `Content-Length` and `Connection: close` are sent.
pub fn encode_request(request: &InboundRequest, endpoint: &Endpoint) -> Vec<u8> {
    let content_type = request
        .header("Content-Type")
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let head = format!(
        "{} {} HTTP/1.0\r\nHost: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        request.method,
        request.path,
        endpoint.host_header(),
        content_type,
        request.body.len(),
    );

    let mut bytes = Vec::with_capacity(head.len() + request.body.len());
    bytes.extend_from_slice(head.as_bytes());
    bytes.extend_from_slice(&request.body);
    bytes
}

/// Parsed status line and header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: HeaderList,
    pub content_length: Option<usize>,
}

/// Position of the header terminator in `buf`, if present.
pub fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

/// Parse a header block (everything before the terminator).
pub fn parse_head(block: &[u8]) -> Result<ResponseHead, FrameError> {
    let text = String::from_utf8_lossy(block);
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..=999).contains(code))
        .ok_or_else(|| FrameError::MalformedStatusLine(status_line.to_string()))?;

    let mut headers = Vec::new();
    let mut content_length = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if content_length.is_none() && name.eq_ignore_ascii_case("content-length") {
            let length = value
                .parse::<usize>()
                .map_err(|_| FrameError::InvalidContentLength(value.to_string()))?;
            content_length = Some(length);
        }
        headers.push((name.to_string(), value.to_string()));
    }

    Ok(ResponseHead {
        status,
        headers,
        content_length,
    })
}

/// Limits applied while reading a raw response.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Deadline for each individual read.
    pub read_timeout: Duration,
    pub max_header_bytes: usize,
}

/// Read and parse a complete response from `reader`.
///
/// A body shorter than the advertised `Content-Length` is delivered as received.
pub async fn read_response<R>(
    reader: &mut R,
    options: ReadOptions,
) -> Result<UpstreamResponse, UpstreamError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; BODY_READ_CHUNK];

    let header_end = loop {
        let n = read_chunk(reader, &mut chunk[..HEADER_READ_CHUNK], options.read_timeout).await?;
        if n == 0 {
            return Err(FrameError::ClosedBeforeHeaders { received: buf.len() }.into());
        }

        // Resume the search just before the new bytes so a split terminator is found.
        let search_from = buf.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_terminator(&buf[search_from..]) {
            break search_from + pos;
        }
        if buf.len() > options.max_header_bytes {
            return Err(FrameError::HeadersTooLarge {
                limit: options.max_header_bytes,
            }
            .into());
        }
    };

    let head = parse_head(&buf[..header_end])?;
    let mut body = buf.split_off(header_end + HEADER_TERMINATOR.len());

    match head.content_length {
        Some(expected) => {
            while body.len() < expected {
                let want = (expected - body.len()).min(BODY_READ_CHUNK);
                let n = read_chunk(reader, &mut chunk[..want], options.read_timeout).await?;
                if n == 0 {
                    tracing::warn!(
                        expected,
                        received = body.len(),
                        "Upstream closed before full body was received"
                    );
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
            }
            body.truncate(expected);
        }
        None => loop {
            let n = read_chunk(reader, &mut chunk, options.read_timeout).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        },
    }

    Ok(UpstreamResponse {
        status: head.status,
        headers: head.headers,
        body: Bytes::from(body),
    })
}

async fn read_chunk<R>(reader: &mut R, buf: &mut [u8], limit: Duration) -> Result<usize, UpstreamError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(limit, reader.read(buf)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(UpstreamError::timeout("read", limit)),
    }
}
