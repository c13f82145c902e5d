//! Pooled outbound HTTP client library.

// Core subsystems
pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod pool;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::{ClientContext, ClientHandle, DefaultKeepAlive, KeepAliveStrategy};
pub use config::ClientConfig;
pub use error::{ClientError, FaultKind, TransportFault};
pub use lifecycle::{Shutdown, ShutdownGuard};
pub use pool::{ConnectionPool, PoolSettings, PoolStats, Route};
pub use resilience::RetryPolicy;
