//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool, client and retry policy produce:
//!     → tracing events with structured fields (route, fault, connection_id)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Prometheus scrape endpoint, when configured
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or recorder itself; binaries do
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
