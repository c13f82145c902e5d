//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! acquire(route)
//!     → manager.rs: idle connection for the route? reuse it
//!     → below per-route and total caps? reserve a slot, dial outside the lock
//!     → otherwise wait for a release until the connection request timeout
//!     → lease.rs: the caller holds the connection exclusively
//! release(lease, keep_alive)
//!     → pooled until keep_alive expires, or closed at once when it is zero
//! ```
//!
//! # Design Decisions
//! - One mutex guards all counters; it is never held across an `.await`
//! - A pending dial counts toward both caps, so bursts cannot overshoot
//! - Unreleased leases close their connection on drop
//! - When the pool is full, the least recently used idle connection of
//!   another route is closed to make room

pub mod lease;
pub mod manager;
pub mod route;

pub use lease::Lease;
pub use manager::{ConnectionPool, PoolSettings, PoolStats, RouteStats};
pub use route::{Route, Scheme};
