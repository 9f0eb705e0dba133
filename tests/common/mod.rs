//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use device_proxy::config::{Endpoint, ProxyConfig};
use device_proxy::http::HttpServer;
use device_proxy::lifecycle::Shutdown;
use device_proxy::observability::ErrorSink;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What a mock upstream does with one connection.
pub enum Action {
    /// Write the bytes in pieces of `piece` bytes, then close.
    Respond { bytes: Vec<u8>, piece: usize },
    /// Close without answering.
    Hangup,
}

impl Action {
    pub fn respond(bytes: impl Into<Vec<u8>>) -> Self {
        Action::Respond {
            bytes: bytes.into(),
            piece: usize::MAX,
        }
    }
}

/// A running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicU32>,
    requests: Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
}

impl MockUpstream {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port())
    }

    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a programmable upstream. `f` receives the 1-indexed connection number.
pub async fn start_programmable_upstream<F>(f: F) -> MockUpstream
where
    F: Fn(u32) -> Action + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let requests = Arc::new(std::sync::Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let (h, r) = (hits.clone(), requests.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = h.fetch_add(1, Ordering::SeqCst) + 1;
            let (f, r) = (f.clone(), r.clone());
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                r.lock().unwrap().push(request);
                match f(n) {
                    Action::Respond { bytes, piece } => {
                        for chunk in bytes.chunks(piece.max(1)) {
                            if socket.write_all(chunk).await.is_err() {
                                return;
                            }
                            let _ = socket.flush().await;
                            if piece != usize::MAX {
                                tokio::time::sleep(Duration::from_millis(2)).await;
                            }
                        }
                        let _ = socket.shutdown().await;
                    }
                    Action::Hangup => drop(socket),
                }
            });
        }
    });

    MockUpstream {
        addr,
        hits,
        requests,
    }
}

/// Start an upstream that always answers with `response`.
pub async fn start_mock_upstream(response: &'static [u8]) -> MockUpstream {
    start_programmable_upstream(move |_| Action::respond(response)).await
}

/// An endpoint on which nothing listens.
pub async fn dead_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Endpoint::new("127.0.0.1", port)
}

/// Read one request: headers, then `Content-Length` bytes of body.
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&received[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if received.len() >= end + 4 + length {
                return received;
            }
        }
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return received,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
    }
}

/// A proxy running against `upstream` with fast retries.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub log_path: PathBuf,
    shutdown: Shutdown,
    _dir: tempfile::TempDir,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config(upstream: Endpoint) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream = upstream;
    config.retries.max_attempts = 3;
    config.retries.initial_backoff_ms = 10;
    config.timeouts.get_secs = 2;
    config.timeouts.options_secs = 2;
    config.timeouts.post_secs = 2;
    config.logging.quiet = true;
    config
}

pub async fn start_proxy(mut config: ProxyConfig) -> TestProxy {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("proxy_errors.log");
    config.logging.error_log = log_path.clone();

    let listener = device_proxy::net::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone(), ErrorSink::from_config(&config.logging));
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        log_path,
        shutdown,
        _dir: dir,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
