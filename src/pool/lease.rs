//! Borrowed connections.

use std::sync::Arc;
use std::time::Duration;

use crate::net::connection::ConnectionId;
use crate::net::Connector;
use crate::pool::manager::PoolInner;
use crate::pool::Route;

/// A connection lent to exactly one in-flight request.
///
/// Hand it back with [`Lease::release`]. Dropping a lease without releasing
/// it closes the connection and frees its slot: its state is unknown after a
/// cancelled or failed exchange.
pub struct Lease<C: Connector> {
    // Declared first so the connection is closed before the slot is freed.
    conn: C::Connection,
    guard: LeaseGuard<C>,
}

impl<C: Connector> Lease<C> {
    pub(crate) fn new(
        pool: Arc<PoolInner<C>>,
        route: Route,
        id: ConnectionId,
        conn: C::Connection,
    ) -> Self {
        Self {
            conn,
            guard: LeaseGuard {
                pool,
                route,
                id,
                armed: true,
            },
        }
    }

    pub fn route(&self) -> &Route {
        &self.guard.route
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id
    }

    pub fn connection(&mut self) -> &mut C::Connection {
        &mut self.conn
    }

    /// Return the connection to the pool for `keep_alive`; zero closes it.
    pub fn release(self, keep_alive: Duration) {
        let Lease { conn, mut guard } = self;
        guard.armed = false;
        guard
            .pool
            .check_in(&guard.route, guard.id, conn, keep_alive);
    }
}

impl<C: Connector> std::fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("route", &self.guard.route)
            .field("id", &self.guard.id)
            .finish()
    }
}

/// Frees the lease's slot when the lease is dropped unreleased.
struct LeaseGuard<C: Connector> {
    pool: Arc<PoolInner<C>>,
    route: Route,
    id: ConnectionId,
    armed: bool,
}

impl<C: Connector> Drop for LeaseGuard<C> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.discard(&self.route, self.id);
        }
    }
}
