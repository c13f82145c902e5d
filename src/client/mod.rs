//! Client subsystem.
//!
//! # Data Flow
//! ```text
//! ClientContext::client()          (pool built once, on first demand)
//!     → ClientHandle::execute(request)
//!     → pool.acquire(route) → exchange under the socket timeout
//!     → success: keep_alive.rs picks the idle lifetime, connection released
//!     → transport fault: connection closed, retry policy consulted
//! ClientContext::shutdown()        (teardown, at most once)
//! ```
//!
//! # Design Decisions
//! - The context is explicit process-scoped state owned by `main`, not a
//!   global; teardown is a step of the orderly shutdown sequence
//! - Handles are cheap clones over the same pool
//! - Request bodies are buffered so a retry can re-send them

pub mod context;
pub mod handle;
pub mod keep_alive;

pub use context::ClientContext;
pub use handle::ClientHandle;
pub use keep_alive::{DefaultKeepAlive, KeepAliveStrategy};
