//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt on a leased connection:
//!     → timeouts.rs (connect and exchange deadlines)
//!     → on transport fault: retries.rs (table lookup + retry budget)
//!     → retry on a fresh connection, or surface the fault unchanged
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every dial and exchange has a deadline
//! - Retries are immediate: the usual cause is a stale pooled connection
//! - A failed connection is never returned to the pool

pub mod retries;
pub mod timeouts;

pub use retries::{RetryContext, RetryDecision, RetryPolicy, RetryTable};
