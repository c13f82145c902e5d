//! Bounded, route-partitioned connection pool.
//!
//! # Accounting
//! Every live connection occupies one slot in exactly one route entry, in one
//! of three states:
//! - `pending`: a slot reserved while the connection is being dialled
//! - `leased`: lent to a request
//! - `idle`: parked in the route's idle queue with an expiry
//!
//! `total` is the sum over all routes. Slots are reserved under the state
//! lock before dialling, so a burst of concurrent `acquire` calls can never
//! overshoot `max_total` or `per_route_max`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::net::connection::ConnectionId;
use crate::net::{Connector, Transport};
use crate::observability::metrics;
use crate::pool::lease::Lease;
use crate::pool::Route;
use crate::resilience::timeouts::with_deadline;

/// Far enough in the future to never expire in practice.
const NEVER: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Limits applied by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_total: usize,
    pub per_route_max: usize,
    /// Maximum wait in `acquire`; zero waits indefinitely.
    pub connection_request_timeout: Duration,
    /// Deadline for dialling a new connection; zero disables it.
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for PoolSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_total: config.max_total_connections,
            per_route_max: config.per_route_max_connections,
            connection_request_timeout: config.connection_request_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Per-route counts in a [`PoolStats`] snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    pub leased: usize,
    pub idle: usize,
    pub pending: usize,
}

impl RouteStats {
    pub fn live(&self) -> usize {
        self.leased + self.idle + self.pending
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub total: usize,
    pub leased: usize,
    pub idle: usize,
    pub pending: usize,
    pub routes: HashMap<Route, RouteStats>,
    /// Connections dialled since the pool was created.
    pub created: u64,
    /// Checkouts served from the idle set.
    pub reused: u64,
    /// Connections closed (expired, evicted, discarded or shut down).
    pub closed: u64,
    pub is_closed: bool,
}

impl PoolStats {
    pub fn route(&self, route: &Route) -> RouteStats {
        self.routes.get(route).copied().unwrap_or_default()
    }
}

struct IdleConnection<T> {
    id: ConnectionId,
    conn: T,
    idle_since: Instant,
    expires_at: Instant,
}

struct RouteEntry<T> {
    idle: VecDeque<IdleConnection<T>>,
    leased: usize,
    pending: usize,
}

impl<T> Default for RouteEntry<T> {
    fn default() -> Self {
        Self {
            idle: VecDeque::new(),
            leased: 0,
            pending: 0,
        }
    }
}

impl<T> RouteEntry<T> {
    fn live(&self) -> usize {
        self.idle.len() + self.leased + self.pending
    }
}

struct PoolState<T> {
    routes: HashMap<Route, RouteEntry<T>>,
    total: usize,
    closed: bool,
    created: u64,
    reused: u64,
    closed_count: u64,
}

impl<T: Transport> PoolState<T> {
    fn new() -> Self {
        Self {
            routes: HashMap::new(),
            total: 0,
            closed: false,
            created: 0,
            reused: 0,
            closed_count: 0,
        }
    }

    /// Account for `n` connections that have just been closed.
    fn forget(&mut self, n: usize) {
        self.total -= n;
        self.closed_count += n as u64;
        metrics::connections_closed(n);
    }

    fn prune(&mut self, route: &Route) {
        if self.routes.get(route).is_some_and(|entry| entry.live() == 0) {
            self.routes.remove(route);
        }
    }

    /// Close idle connections past expiry or reported closed by the transport.
    fn evict_expired(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        for (route, entry) in self.routes.iter_mut() {
            let before = entry.idle.len();
            entry
                .idle
                .retain(|idle| idle.expires_at > now && idle.conn.is_open());
            let evicted = before - entry.idle.len();
            if evicted > 0 {
                tracing::debug!(route = %route, evicted, "Evicted idle connections");
            }
            removed += evicted;
        }
        if removed > 0 {
            self.forget(removed);
            self.routes.retain(|_, entry| entry.live() > 0);
        }
        removed
    }

    /// Close the least recently used idle connection of any route except
    /// `keep`, freeing one pool-wide slot.
    fn evict_lru_except(&mut self, keep: &Route) -> bool {
        let victim = self
            .routes
            .iter()
            .filter(|(route, _)| *route != keep)
            .filter_map(|(route, entry)| entry.idle.front().map(|idle| (route, idle.idle_since)))
            .min_by_key(|(_, since)| *since)
            .map(|(route, _)| route.clone());

        let Some(route) = victim else {
            return false;
        };
        if let Some(entry) = self.routes.get_mut(&route) {
            if let Some(idle) = entry.idle.pop_front() {
                tracing::debug!(route = %route, connection_id = %idle.id, "Closing idle connection to make room");
                drop(idle);
            }
        }
        self.forget(1);
        self.prune(&route);
        true
    }

    fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            total: self.total,
            created: self.created,
            reused: self.reused,
            closed: self.closed_count,
            is_closed: self.closed,
            ..PoolStats::default()
        };
        for (route, entry) in &self.routes {
            let route_stats = RouteStats {
                leased: entry.leased,
                idle: entry.idle.len(),
                pending: entry.pending,
            };
            stats.leased += route_stats.leased;
            stats.idle += route_stats.idle;
            stats.pending += route_stats.pending;
            stats.routes.insert(route.clone(), route_stats);
        }
        stats
    }
}

enum Checkout<T> {
    Reused(ConnectionId, T),
    Reserved,
    Wait,
}

pub(crate) struct PoolInner<C: Connector> {
    connector: C,
    settings: PoolSettings,
    state: Mutex<PoolState<C::Connection>>,
    available: Notify,
    closing: watch::Sender<bool>,
}

impl<C: Connector> PoolInner<C> {
    fn lock(&self) -> MutexGuard<'_, PoolState<C::Connection>> {
        // A panic while holding the lock cannot leave the counters half
        // updated, so a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn checkout(&self, route: &Route) -> Result<Checkout<C::Connection>, ClientError> {
        self.evict_expired();

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(ClientError::PoolClosed);
        }

        let mut stale = 0;
        let mut reused = None;
        if let Some(entry) = state.routes.get_mut(route) {
            // Most recently released first.
            while let Some(idle) = entry.idle.pop_back() {
                if idle.conn.is_open() {
                    entry.leased += 1;
                    reused = Some((idle.id, idle.conn));
                    break;
                }
                tracing::debug!(route = %route, connection_id = %idle.id, "Discarding stale idle connection");
                stale += 1;
            }
        }
        if stale > 0 {
            state.forget(stale);
            state.prune(route);
        }
        if let Some((id, conn)) = reused {
            state.reused += 1;
            metrics::connection_reused(route);
            return Ok(Checkout::Reused(id, conn));
        }

        let route_live = state.routes.get(route).map_or(0, RouteEntry::live);
        if route_live >= self.settings.per_route_max {
            return Ok(Checkout::Wait);
        }
        if state.total >= self.settings.max_total && !state.evict_lru_except(route) {
            return Ok(Checkout::Wait);
        }

        state.routes.entry(route.clone()).or_default().pending += 1;
        state.total += 1;
        Ok(Checkout::Reserved)
    }

    /// Turn a reserved slot into a lease once dialling succeeded.
    fn promote(&self, route: &Route) -> Result<ConnectionId, ClientError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let closed = state.closed;
        if let Some(entry) = state.routes.get_mut(route) {
            entry.pending -= 1;
            if !closed {
                entry.leased += 1;
            }
        }
        state.created += 1;
        if closed {
            state.forget(1);
            state.prune(route);
            return Err(ClientError::PoolClosed);
        }
        metrics::connection_created(route);
        Ok(ConnectionId::new())
    }

    /// Give back a reserved slot whose dial failed or was cancelled.
    fn unreserve(&self, route: &Route) {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if let Some(entry) = state.routes.get_mut(route) {
                entry.pending -= 1;
            }
            state.total -= 1;
            state.prune(route);
        }
        self.available.notify_waiters();
    }

    pub(crate) fn check_in(
        &self,
        route: &Route,
        id: ConnectionId,
        conn: C::Connection,
        keep_alive: Duration,
    ) {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let closed = state.closed;
            let Some(entry) = state.routes.get_mut(route) else {
                return;
            };
            entry.leased -= 1;

            if closed || keep_alive.is_zero() || !conn.is_open() {
                tracing::debug!(
                    route = %route,
                    connection_id = %id,
                    keep_alive_ms = keep_alive.as_millis() as u64,
                    "Closing released connection"
                );
                drop(conn);
                state.forget(1);
                state.prune(route);
            } else {
                let now = Instant::now();
                let expires_at = now
                    .checked_add(keep_alive)
                    .unwrap_or_else(|| now + NEVER);
                entry.idle.push_back(IdleConnection {
                    id,
                    conn,
                    idle_since: now,
                    expires_at,
                });
                tracing::trace!(route = %route, connection_id = %id, ?keep_alive, "Connection returned to pool");
            }
        }
        self.available.notify_waiters();
    }

    pub(crate) fn discard(&self, route: &Route, id: ConnectionId) {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if let Some(entry) = state.routes.get_mut(route) {
                entry.leased -= 1;
                state.forget(1);
                state.prune(route);
            }
        }
        tracing::debug!(route = %route, connection_id = %id, "Leased connection dropped without release, closed");
        self.available.notify_waiters();
    }

    fn evict_expired(&self) -> usize {
        let removed = self.lock().evict_expired(Instant::now());
        if removed > 0 {
            self.available.notify_waiters();
        }
        removed
    }

    fn shutdown(&self) {
        let closed = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.closed {
                return;
            }
            state.closed = true;
            let mut closed = 0;
            for entry in state.routes.values_mut() {
                closed += entry.idle.len();
                entry.idle.clear();
            }
            state.forget(closed);
            state.routes.retain(|_, entry| entry.live() > 0);
            closed
        };
        // Tears down the drivers of leased connections too.
        self.closing.send_replace(true);
        self.available.notify_waiters();
        tracing::info!(closed_idle = closed, "Connection pool shut down");
    }
}

/// Frees a reserved slot if dialling fails or the acquiring future is dropped.
struct Reservation<'a, C: Connector> {
    pool: &'a PoolInner<C>,
    route: &'a Route,
    armed: bool,
}

impl<C: Connector> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.unreserve(self.route);
        }
    }
}

/// Shared handle to the pool. Cloning is cheap and every clone sees the
/// same connections and counters.
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C, settings: PoolSettings) -> Self {
        let (closing, _) = watch::channel(false);
        tracing::debug!(
            max_total = settings.max_total,
            per_route_max = settings.per_route_max,
            "Connection pool created"
        );
        Self {
            inner: Arc::new(PoolInner {
                connector,
                settings,
                state: Mutex::new(PoolState::new()),
                available: Notify::new(),
                closing,
            }),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    /// Borrow a connection to `route`.
    ///
    /// Reuses an idle connection when one is available, dials a new one when
    /// both the route and the pool are below their caps, and otherwise waits
    /// for a slot until the connection request timeout elapses.
    pub async fn acquire(&self, route: &Route) -> Result<Lease<C>, ClientError> {
        let wait = self.inner.settings.connection_request_timeout;
        let deadline = (!wait.is_zero()).then(|| Instant::now() + wait);

        loop {
            // Registered before inspecting the state so a release between
            // the check and the wait is not missed.
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.inner.checkout(route)? {
                Checkout::Reused(id, conn) => {
                    tracing::trace!(route = %route, connection_id = %id, "Reusing pooled connection");
                    return Ok(Lease::new(Arc::clone(&self.inner), route.clone(), id, conn));
                }
                Checkout::Reserved => return self.dial(route).await,
                Checkout::Wait => {}
            }

            tracing::trace!(route = %route, "Pool at capacity, waiting for a connection");
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        tracing::warn!(route = %route, waited = ?wait, "Timed out waiting for a pooled connection");
                        metrics::pool_exhausted(route);
                        return Err(ClientError::PoolExhausted {
                            route: route.clone(),
                            waited: wait,
                        });
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn dial(&self, route: &Route) -> Result<Lease<C>, ClientError> {
        let mut reservation = Reservation {
            pool: &self.inner,
            route,
            armed: true,
        };

        let connecting = self
            .inner
            .connector
            .connect(route, self.inner.closing.subscribe());
        let conn = match with_deadline(self.inner.settings.connect_timeout, "connect", connecting).await {
            Ok(conn) => conn,
            Err(fault) => {
                tracing::debug!(route = %route, fault = %fault.kind, error = %fault.message, "Failed to open connection");
                return Err(ClientError::Transport(fault));
            }
        };

        reservation.armed = false;
        let id = self.inner.promote(route)?;
        tracing::debug!(route = %route, connection_id = %id, "Opened new connection");
        Ok(Lease::new(Arc::clone(&self.inner), route.clone(), id, conn))
    }

    /// Return a leased connection, pooling it for `keep_alive`.
    ///
    /// A zero duration closes the connection immediately.
    pub fn release(&self, lease: Lease<C>, keep_alive: Duration) {
        lease.release(keep_alive);
    }

    /// Close idle connections past their keep-alive expiry.
    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired()
    }

    /// Close every connection and refuse further `acquire` calls.
    ///
    /// Idempotent. Leased connections are torn down by their drivers; the
    /// requests using them fail with a transport fault.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let stats = self.inner.lock().stats();
        metrics::pool_gauges(&stats);
        stats
    }

    /// Whether two handles share one pool.
    pub fn same_pool(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Spawn the periodic eviction task on the current Tokio runtime.
    ///
    /// Returns `None` when `interval` is zero. The task stops when the pool
    /// shuts down or is dropped.
    pub fn spawn_evictor(&self, interval: Duration) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            return None;
        }
        let pool: Weak<PoolInner<C>> = Arc::downgrade(&self.inner);
        let mut closing = self.inner.closing.subscribe();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(pool) = pool.upgrade() else { break };
                        pool.evict_expired();
                        let stats = pool.lock().stats();
                        metrics::pool_gauges(&stats);
                    }
                    _ = closing.wait_for(|closed| *closed) => break,
                }
            }
            tracing::debug!("Idle connection evictor stopped");
        }))
    }
}
