//! The handle callers issue requests through.

use std::sync::Arc;
use std::time::Duration;

use hyper::body::Bytes;
use hyper::header::{HeaderValue, USER_AGENT};
use hyper::{Request, Response, Uri};

use crate::client::keep_alive::{DefaultKeepAlive, KeepAliveStrategy};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::net::{Connector, HttpConnector, Transport};
use crate::observability::metrics;
use crate::pool::{ConnectionPool, PoolStats, Route};
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{RetryContext, RetryDecision, RetryPolicy};

/// Pool, retry policy, exchange timeout and keep-alive strategy composed into
/// one value. Clones share the pool.
pub struct ClientHandle<C: Connector = HttpConnector> {
    pool: ConnectionPool<C>,
    retry: RetryPolicy,
    keep_alive: Arc<dyn KeepAliveStrategy>,
    socket_timeout: Duration,
    user_agent: Option<HeaderValue>,
}

impl<C: Connector> Clone for ClientHandle<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            retry: self.retry.clone(),
            keep_alive: Arc::clone(&self.keep_alive),
            socket_timeout: self.socket_timeout,
            user_agent: self.user_agent.clone(),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ClientHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("retry", &self.retry)
            .field("socket_timeout", &self.socket_timeout)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ClientHandle<C> {
    /// Compose a handle over `pool` with the policies described by `config`.
    pub fn new(pool: ConnectionPool<C>, config: &ClientConfig) -> Self {
        let user_agent = match HeaderValue::from_str(&config.user_agent) {
            Ok(value) if !config.user_agent.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(user_agent = %config.user_agent, error = %e, "Ignoring invalid User-Agent");
                None
            }
        };
        Self {
            pool,
            retry: RetryPolicy::from_config(config),
            keep_alive: Arc::new(DefaultKeepAlive::new(config.default_keep_alive())),
            socket_timeout: config.socket_timeout(),
            user_agent,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_keep_alive<K>(mut self, strategy: K) -> Self
    where
        K: KeepAliveStrategy + 'static,
    {
        self.keep_alive = Arc::new(strategy);
        self
    }

    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Send `request`, retrying retryable transport faults on a fresh
    /// connection until the retry budget is spent.
    ///
    /// HTTP error statuses are responses, not errors.
    pub async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ClientError> {
        let result = self.run(request).await;
        match &result {
            Ok(_) => metrics::request_succeeded(),
            Err(e) => metrics::request_failed(e),
        }
        result
    }

    /// `GET uri` with an empty body.
    pub async fn get(&self, uri: &str) -> Result<Response<Bytes>, ClientError> {
        let uri: Uri = uri
            .parse()
            .map_err(|e| ClientError::InvalidRequest(format!("invalid URI `{uri}`: {e}")))?;
        let mut request = Request::new(Bytes::new());
        *request.uri_mut() = uri;
        self.execute(request).await
    }

    async fn run(&self, mut request: Request<Bytes>) -> Result<Response<Bytes>, ClientError> {
        let route = Route::from_uri(request.uri())?;
        if let Some(user_agent) = &self.user_agent {
            request
                .headers_mut()
                .entry(USER_AGENT)
                .or_insert_with(|| user_agent.clone());
        }

        let mut attempt_count = 0;
        loop {
            let fault = match self.attempt(&route, &request).await {
                Ok(response) => return Ok(response),
                Err(ClientError::Transport(fault)) => fault,
                Err(other) => return Err(other),
            };

            let ctx = RetryContext {
                fault: &fault,
                attempt_count,
                request: &request,
            };
            match self.retry.decide(&ctx) {
                RetryDecision::Retry => {
                    metrics::retry(fault.kind);
                    attempt_count += 1;
                }
                RetryDecision::GiveUp => return Err(ClientError::Transport(fault)),
                RetryDecision::Exhausted => {
                    return Err(ClientError::RetryExhausted {
                        attempts: attempt_count + 1,
                        last: fault,
                    })
                }
            }
        }
    }

    /// One exchange on one leased connection. A connection that fails or
    /// times out mid-exchange is closed, never pooled.
    async fn attempt(&self, route: &Route, request: &Request<Bytes>) -> Result<Response<Bytes>, ClientError> {
        let mut lease = self.pool.acquire(route).await?;
        let exchange = lease.connection().send(replay(request));
        match with_deadline(self.socket_timeout, "exchange", exchange).await {
            Ok(response) => {
                let keep_alive = self.keep_alive.duration_for(response.headers());
                tracing::trace!(
                    route = %route,
                    connection_id = %lease.id(),
                    status = response.status().as_u16(),
                    keep_alive = ?keep_alive,
                    "Exchange complete"
                );
                self.pool.release(lease, keep_alive);
                Ok(response)
            }
            Err(fault) => {
                tracing::debug!(
                    route = %route,
                    connection_id = %lease.id(),
                    fault = %fault.kind,
                    "Closing connection after failed exchange"
                );
                drop(lease);
                Err(ClientError::Transport(fault))
            }
        }
    }
}

/// A copy of `request` for one attempt; the original is kept for retries.
fn replay(request: &Request<Bytes>) -> Request<Bytes> {
    let mut copy = Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
