//! Retry decisions for transport faults.
//!
//! # Responsibilities
//! - Decide whether a failed attempt may be retried, from its fault kind and
//!   the number of retries already spent
//! - Log every decision with the fault kind
//!
//! # Design Decisions
//! - Only transport faults reach this module; HTTP error statuses never do
//! - Faults that point at a stale pooled connection are retried on a fresh
//!   one; faults that point at configuration, security or an unreachable
//!   peer are not
//! - The table is plain data so configuration can override single entries
//! - Idempotency of retried requests is the caller's responsibility

use std::collections::BTreeMap;

use hyper::body::Bytes;
use hyper::Request;

use crate::config::ClientConfig;
use crate::error::{FaultKind, TransportFault};

/// Retry verdict per fault kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTable([bool; FaultKind::COUNT]);

impl RetryTable {
    /// The shipped policy.
    pub fn standard() -> Self {
        let mut table = [false; FaultKind::COUNT];
        table[FaultKind::PeerClosed as usize] = true;
        table[FaultKind::Other as usize] = true;
        Self(table)
    }

    pub fn allows(&self, kind: FaultKind) -> bool {
        self.0[kind.index()]
    }

    pub fn with(mut self, kind: FaultKind, retry: bool) -> Self {
        self.0[kind.index()] = retry;
        self
    }

    /// Apply `name = bool` overrides; unknown names are skipped (validation
    /// rejects them before they get here).
    pub fn with_overrides(self, overrides: &BTreeMap<String, bool>) -> Self {
        overrides.iter().fold(self, |table, (name, retry)| match name.parse() {
            Ok(kind) => table.with(kind, *retry),
            Err(_) => table,
        })
    }
}

impl Default for RetryTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Everything known about one failed attempt.
#[derive(Debug)]
pub struct RetryContext<'a> {
    pub fault: &'a TransportFault,
    /// Retries already performed for this request (0 on the first failure).
    pub attempt_count: u32,
    pub request: &'a Request<Bytes>,
}

/// Outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// The fault kind is never retried.
    GiveUp,
    /// The fault kind is retryable but the budget is spent.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    table: RetryTable,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, RetryTable::standard())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, table: RetryTable) -> Self {
        Self { max_retries, table }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.max_retries,
            RetryTable::standard().with_overrides(&config.retry_overrides),
        )
    }

    /// Whether an attempt that failed with `fault` may be retried.
    pub fn should_retry(&self, fault: &TransportFault, attempt_count: u32) -> bool {
        self.classify(fault.kind, attempt_count) == RetryDecision::Retry
    }

    fn classify(&self, kind: FaultKind, attempt_count: u32) -> RetryDecision {
        if attempt_count >= self.max_retries {
            if self.table.allows(kind) {
                RetryDecision::Exhausted
            } else {
                RetryDecision::GiveUp
            }
        } else if self.table.allows(kind) {
            RetryDecision::Retry
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Decide on a failed attempt and log the decision.
    pub fn decide(&self, ctx: &RetryContext<'_>) -> RetryDecision {
        let decision = self.classify(ctx.fault.kind, ctx.attempt_count);
        let method = ctx.request.method();
        let uri = ctx.request.uri();
        match decision {
            RetryDecision::Retry => tracing::warn!(
                fault = %ctx.fault.kind,
                attempt = ctx.attempt_count + 1,
                max_retries = self.max_retries,
                %method,
                %uri,
                error = %ctx.fault.message,
                "Transport fault, retrying"
            ),
            RetryDecision::GiveUp => tracing::error!(
                fault = %ctx.fault.kind,
                %method,
                %uri,
                error = %ctx.fault.message,
                "Transport fault is not retryable"
            ),
            RetryDecision::Exhausted => tracing::error!(
                fault = %ctx.fault.kind,
                attempts = ctx.attempt_count + 1,
                %method,
                %uri,
                error = %ctx.fault.message,
                "Retry budget exhausted"
            ),
        }
        decision
    }
}
