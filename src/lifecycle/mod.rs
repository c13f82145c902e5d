//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → ClientContext (pool built on first request)
//!
//! Shutdown (shutdown.rs):
//!     Signal or end of work → Shutdown::trigger → stop issuing requests
//!     → ClientContext::shutdown (ShutdownGuard guarantees it on every exit path)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Teardown is an explicit, ordered step rather than an implicit exit hook
//! - Pool shutdown is idempotent, so the guard and an explicit call compose

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownGuard};
