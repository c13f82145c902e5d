//! Process-scoped ownership of the shared pool.
//!
//! A [`ClientContext`] is created once during startup and passed to whoever
//! needs to issue requests. The first [`ClientContext::client`] call builds
//! the pool; every later call, from any task, gets a handle on that same
//! pool. [`ClientContext::shutdown`] is the teardown step of the orderly
//! shutdown sequence and runs at most once.

use std::sync::{Mutex, MutexGuard, OnceLock};

use tokio::task::JoinHandle;

use crate::client::handle::ClientHandle;
use crate::config::{validate_config, ClientConfig, ConfigError};
use crate::net::{Connector, HttpConnector};
use crate::pool::{ConnectionPool, PoolSettings};

#[derive(Default)]
struct Lifecycle {
    shut_down: bool,
    evictor: Option<JoinHandle<()>>,
}

pub struct ClientContext<C: Connector + Clone = HttpConnector> {
    config: ClientConfig,
    connector: C,
    handle: OnceLock<ClientHandle<C>>,
    // Serializes first construction against shutdown.
    lifecycle: Mutex<Lifecycle>,
}

impl ClientContext<HttpConnector> {
    /// Validate `config` and prepare a context dialling real HTTP/HTTPS.
    ///
    /// No connection is opened until the first request.
    pub fn from_config(config: ClientConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let connector = HttpConnector::new()?;
        Ok(Self::with_connector(config, connector))
    }
}

impl<C: Connector + Clone> ClientContext<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            handle: OnceLock::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared client handle, built on first use.
    ///
    /// Concurrent first callers race on the lifecycle lock; exactly one
    /// builds the pool. After [`shutdown`](Self::shutdown) the handle still
    /// resolves, but every request on it fails with `PoolClosed`.
    pub fn client(&self) -> ClientHandle<C> {
        if let Some(handle) = self.handle.get() {
            return handle.clone();
        }

        let mut lifecycle = self.lock();
        if let Some(handle) = self.handle.get() {
            return handle.clone();
        }

        let pool = ConnectionPool::new(self.connector.clone(), PoolSettings::from(&self.config));
        if lifecycle.shut_down {
            pool.shutdown();
        } else {
            lifecycle.evictor = match tokio::runtime::Handle::try_current() {
                Ok(_) => pool.spawn_evictor(self.config.eviction_interval()),
                Err(_) => {
                    tracing::warn!("No Tokio runtime; idle connections are only evicted on checkout");
                    None
                }
            };
            tracing::info!(
                max_total = self.config.max_total_connections,
                per_route_max = self.config.per_route_max_connections,
                max_retries = self.config.max_retries,
                "HTTP client initialized"
            );
        }

        let handle = ClientHandle::new(pool, &self.config);
        let _ = self.handle.set(handle.clone());
        handle
    }

    /// Whether the client has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Close the pool and stop background eviction. Idempotent; only the
    /// first call does anything.
    pub fn shutdown(&self) {
        let mut lifecycle = self.lock();
        if lifecycle.shut_down {
            return;
        }
        lifecycle.shut_down = true;

        if let Some(evictor) = lifecycle.evictor.take() {
            evictor.abort();
        }
        match self.handle.get() {
            Some(handle) => {
                let stats = handle.stats();
                handle.pool().shutdown();
                tracing::info!(
                    created = stats.created,
                    reused = stats.reused,
                    closed = stats.closed,
                    "HTTP client shut down"
                );
            }
            None => tracing::debug!("HTTP client shut down before first use"),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C: Connector + Clone> std::fmt::Debug for ClientContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("initialized", &self.is_initialized())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, TransportFault};
    use crate::net::Transport;
    use crate::pool::Route;
    use hyper::body::Bytes;
    use hyper::{Request, Response};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::watch;

    #[derive(Clone, Default)]
    struct Loopback {
        dialled: Arc<AtomicUsize>,
    }

    struct LoopbackConnection;

    impl Transport for LoopbackConnection {
        async fn send(&mut self, _request: Request<Bytes>) -> Result<Response<Bytes>, TransportFault> {
            Ok(Response::new(Bytes::from_static(b"pong")))
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    impl Connector for Loopback {
        type Connection = LoopbackConnection;

        async fn connect(
            &self,
            _route: &Route,
            _closing: watch::Receiver<bool>,
        ) -> Result<LoopbackConnection, TransportFault> {
            self.dialled.fetch_add(1, Ordering::SeqCst);
            Ok(LoopbackConnection)
        }
    }

    fn context() -> Arc<ClientContext<Loopback>> {
        Arc::new(ClientContext::with_connector(ClientConfig::default(), Loopback::default()))
    }

    #[tokio::test]
    async fn pool_is_built_lazily() {
        let ctx = context();
        assert!(!ctx.is_initialized());
        ctx.client();
        assert!(ctx.is_initialized());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_pool() {
        let ctx = context();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let ctx = Arc::clone(&ctx);
            tasks.push(tokio::spawn(async move { ctx.client() }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        let first = &handles[0];
        assert!(handles.iter().all(|h| h.pool().same_pool(first.pool())));

        first.get("http://example.test/").await.unwrap();
        assert_eq!(handles[7].stats().total, 1);
        assert_eq!(ctx.client().stats().idle, 1);
    }

    #[tokio::test]
    async fn shutdown_closes_the_shared_pool() {
        let ctx = context();
        let client = ctx.client();
        client.get("http://example.test/").await.unwrap();

        ctx.shutdown();
        assert!(ctx.is_shut_down());
        assert_eq!(client.stats().total, 0);

        let err = client.get("http://example.test/").await.unwrap_err();
        assert!(matches!(err, ClientError::PoolClosed));
        let err = ctx.client().get("http://example.test/").await.unwrap_err();
        assert!(matches!(err, ClientError::PoolClosed));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let ctx = context();
        ctx.client();
        ctx.shutdown();
        ctx.shutdown();
        assert!(ctx.client().pool().is_closed());
    }

    #[tokio::test]
    async fn shutdown_before_first_use_yields_a_closed_pool() {
        let ctx = context();
        ctx.shutdown();
        let client = ctx.client();
        assert!(client.pool().is_closed());
        assert!(matches!(
            client.get("http://example.test/").await,
            Err(ClientError::PoolClosed)
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = ClientConfig {
            max_total_connections: 0,
            ..ClientConfig::default()
        };
        let err = ClientContext::from_config(config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
