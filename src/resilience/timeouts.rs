//! Timeout enforcement.
//!
//! Every dial and every request/response exchange runs under a deadline. An
//! elapsed deadline becomes a [`FaultKind::Timeout`] transport fault so it is
//! classified like any other connection-level failure. A zero limit means no
//! deadline.

use std::future::Future;
use std::time::Duration;

use crate::error::{FaultKind, TransportFault};

/// Run `fut` under `limit`, reporting expiry as a timeout fault for `phase`.
pub async fn with_deadline<F, T>(limit: Duration, phase: &'static str, fut: F) -> Result<T, TransportFault>
where
    F: Future<Output = Result<T, TransportFault>>,
{
    if limit.is_zero() {
        return fut.await;
    }
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportFault::new(
            FaultKind::Timeout,
            format!("{phase} timed out after {limit:?}"),
        )),
    }
}
