//! Method-based dispatch to forwarding strategies.

use crate::config::{Endpoint, ProxyConfig};
use crate::observability::ErrorSink;
use crate::resilience::{RetryExecutor, RetryOutcome, RetryPolicy, Sleeper, TokioSleeper};
use crate::routing::ForwardStrategy;
use crate::upstream::{HttpForwarder, InboundRequest, Method, RawForwarder, UpstreamResponse};

/// What the client should receive for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The upstream answered; relay it.
    Relay(UpstreamResponse),
    /// The upstream could not be used; the message names target and cause.
    BadGateway(String),
    /// Preflight could not be forwarded; answer with permissive CORS headers.
    CorsFallback,
}

/// The strategy used for each method.
#[derive(Debug, Clone)]
pub struct Strategies<G, P> {
    pub get: G,
    pub options: G,
    pub post: P,
}

/// Routes inbound requests to a forwarding strategy by method.
#[derive(Debug)]
pub struct RequestRouter<G = HttpForwarder, P = RawForwarder, S = TokioSleeper> {
    endpoint: Endpoint,
    strategies: Strategies<G, P>,
    executor: RetryExecutor<S>,
    preflight: RetryExecutor<S>,
    sink: ErrorSink,
}

impl RequestRouter {
    /// Build the production router: hyper client for GET/OPTIONS, raw framing for POST.
    pub fn from_config(config: &ProxyConfig, sink: ErrorSink) -> Self {
        let endpoint = config.upstream.clone();
        let strategies = Strategies {
            get: HttpForwarder::new(endpoint.clone(), config.timeouts.get()),
            options: HttpForwarder::new(endpoint.clone(), config.timeouts.options()),
            post: RawForwarder::new(
                endpoint.clone(),
                config.timeouts.post(),
                config.limits.max_header_bytes,
            ),
        };

        Self::new(
            endpoint,
            strategies,
            RetryPolicy::from(&config.retries),
            TokioSleeper,
            sink,
        )
    }
}

impl<G, P, S> RequestRouter<G, P, S>
where
    G: ForwardStrategy,
    P: ForwardStrategy,
    S: Sleeper + Clone,
{
    pub fn new(
        endpoint: Endpoint,
        strategies: Strategies<G, P>,
        policy: RetryPolicy,
        sleeper: S,
        sink: ErrorSink,
    ) -> Self {
        // A preflight must not hold up the request that follows it.
        let preflight_policy = RetryPolicy {
            max_attempts: 0,
            ..policy
        };

        Self {
            endpoint,
            strategies,
            executor: RetryExecutor::with_sleeper(policy, sleeper.clone()),
            preflight: RetryExecutor::with_sleeper(preflight_policy, sleeper),
            sink,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn sink(&self) -> &ErrorSink {
        &self.sink
    }

    /// Forward `request` with the strategy for its method.
    pub async fn dispatch(&self, request: &InboundRequest) -> Reply {
        match request.method {
            Method::Get => self.forward_with_retries(&self.strategies.get, request).await,
            Method::Post => self.forward_with_retries(&self.strategies.post, request).await,
            Method::Options => self.preflight(request).await,
        }
    }

    async fn forward_with_retries<F>(&self, strategy: &F, request: &InboundRequest) -> Reply
    where
        F: ForwardStrategy,
    {
        let outcome = self
            .executor
            .run(move |attempt| {
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    attempt = attempt.number,
                    "Forwarding attempt"
                );
                strategy.forward(request)
            })
            .await;

        match outcome {
            RetryOutcome::Success(response) => {
                tracing::info!(
                    method = %request.method,
                    path = %request.path,
                    status = response.status,
                    "✓ Relayed upstream response"
                );
                Reply::Relay(response)
            }
            RetryOutcome::ExhaustedRetries {
                retries,
                last_error,
            } => {
                self.sink
                    .record(&format!(
                        "Proxy error after {} retries for {} {}: {}",
                        retries, request.method, request.path, last_error
                    ))
                    .await;
                Reply::BadGateway(format!(
                    "Upstream {} unreachable after {} retries: {}",
                    self.endpoint, retries, last_error
                ))
            }
            RetryOutcome::FatalError { error, .. } => {
                self.sink
                    .record(&format!(
                        "Unexpected proxy error on {} {}: {}",
                        request.method, request.path, error
                    ))
                    .await;
                Reply::BadGateway(format!(
                    "Proxy error contacting {}: {}",
                    self.endpoint, error
                ))
            }
        }
    }

    async fn preflight(&self, request: &InboundRequest) -> Reply {
        let strategy = &self.strategies.options;
        match self.preflight.run(move |_| strategy.forward(request)).await {
            RetryOutcome::Success(response) => {
                tracing::info!(path = %request.path, status = response.status, "✓ OPTIONS relayed");
                Reply::Relay(response)
            }
            outcome => {
                if let Err(error) = outcome.into_result() {
                    tracing::info!(path = %request.path, error = %error, "✓ OPTIONS answered by fallback");
                }
                Reply::CorsFallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{FrameError, UpstreamError};
    use axum::body::Bytes;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Replays scripted results, one per attempt.
    #[derive(Default)]
    struct Scripted {
        results: Mutex<VecDeque<Result<UpstreamResponse, UpstreamError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(results: Vec<Result<UpstreamResponse, UpstreamError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ForwardStrategy for Scripted {
        fn forward(
            &self,
            _request: &InboundRequest,
        ) -> impl Future<Output = Result<UpstreamResponse, UpstreamError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(refused()));
            std::future::ready(next)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct NoSleep(Arc<Mutex<Vec<Duration>>>);

    impl Sleeper for NoSleep {
        fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send {
            self.0.lock().unwrap().push(delay);
            std::future::ready(())
        }
    }

    fn refused() -> UpstreamError {
        UpstreamError::Connect {
            endpoint: "192.168.100.2:80".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        }
    }

    fn ok(body: &'static str) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            headers: vec![("Content-Length".into(), body.len().to_string())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    struct Harness {
        router: RequestRouter<Scripted, Scripted, NoSleep>,
        sleeps: NoSleep,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(get: Vec<Result<UpstreamResponse, UpstreamError>>, post: Vec<Result<UpstreamResponse, UpstreamError>>) -> Self {
            Self::with_options(get, Vec::new(), post)
        }

        fn with_options(
            get: Vec<Result<UpstreamResponse, UpstreamError>>,
            options: Vec<Result<UpstreamResponse, UpstreamError>>,
            post: Vec<Result<UpstreamResponse, UpstreamError>>,
        ) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let sink = ErrorSink::new(dir.path().join("proxy_errors.log"), true);
            let sleeps = NoSleep::default();
            let router = RequestRouter::new(
                Endpoint::new("192.168.100.2", 80),
                Strategies {
                    get: Scripted::new(get),
                    options: Scripted::new(options),
                    post: Scripted::new(post),
                },
                RetryPolicy::default(),
                sleeps.clone(),
                sink,
            );
            Self {
                router,
                sleeps,
                _dir: dir,
            }
        }

        fn log_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.router.sink().path())
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.0.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn get_success_after_retries_relays_response() {
        let harness = Harness::new(vec![Err(refused()), Err(refused()), Ok(ok("hello"))], vec![]);

        let reply = harness.router.dispatch(&InboundRequest::new(Method::Get, "/")).await;

        assert_eq!(reply, Reply::Relay(ok("hello")));
        assert_eq!(harness.router.strategies.get.calls(), 3);
        assert_eq!(harness.sleeps(), vec![Duration::from_millis(500), Duration::from_millis(1000)]);
        assert!(harness.log_lines().is_empty());
    }

    #[tokio::test]
    async fn exhausted_get_is_502_with_one_log_record() {
        let harness = Harness::new(vec![], vec![]);

        let reply = harness
            .router
            .dispatch(&InboundRequest::new(Method::Get, "/api/status"))
            .await;

        match reply {
            Reply::BadGateway(message) => {
                assert!(message.contains("192.168.100.2:80"), "{}", message);
                assert!(message.contains("after 5 retries"), "{}", message);
            }
            other => panic!("expected 502, got {:?}", other),
        }
        assert_eq!(harness.router.strategies.get.calls(), 6);
        assert_eq!(
            harness.sleeps(),
            [500, 1000, 2000, 4000, 8000]
                .into_iter()
                .map(Duration::from_millis)
                .collect::<Vec<_>>()
        );

        let lines = harness.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("after 5 retries for GET /api/status"), "{}", lines[0]);
    }

    #[tokio::test]
    async fn framing_error_on_post_is_immediate_502() {
        let harness = Harness::new(
            vec![],
            vec![Err(UpstreamError::Framing(FrameError::ClosedBeforeHeaders { received: 0 }))],
        );

        let request = InboundRequest::new(Method::Post, "/api/config").with_body(&b"{}"[..]);
        let reply = harness.router.dispatch(&request).await;

        assert!(matches!(reply, Reply::BadGateway(ref m) if m.contains("connection closed before headers")));
        assert_eq!(harness.router.strategies.post.calls(), 1);
        assert!(harness.sleeps().is_empty());

        let lines = harness.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Unexpected proxy error on POST /api/config"));
    }

    #[tokio::test]
    async fn post_uses_raw_strategy_only() {
        let harness = Harness::new(vec![], vec![Ok(ok("saved"))]);

        let reply = harness
            .router
            .dispatch(&InboundRequest::new(Method::Post, "/api/config"))
            .await;

        assert_eq!(reply, Reply::Relay(ok("saved")));
        assert_eq!(harness.router.strategies.get.calls(), 0);
        assert_eq!(harness.router.strategies.post.calls(), 1);
    }

    #[tokio::test]
    async fn unreachable_preflight_falls_back_without_retrying() {
        let harness = Harness::with_options(vec![], vec![Err(refused())], vec![]);

        let reply = harness
            .router
            .dispatch(&InboundRequest::new(Method::Options, "/api/config"))
            .await;

        assert_eq!(reply, Reply::CorsFallback);
        assert_eq!(harness.router.strategies.options.calls(), 1);
        assert!(harness.sleeps().is_empty());
        assert!(harness.log_lines().is_empty());
    }

    #[tokio::test]
    async fn answered_preflight_is_relayed() {
        let harness = Harness::with_options(vec![], vec![Ok(ok(""))], vec![]);

        let reply = harness
            .router
            .dispatch(&InboundRequest::new(Method::Options, "/"))
            .await;

        assert_eq!(reply, Reply::Relay(ok("")));
    }
}
