//! How long a connection may idle in the pool after a response.

use std::time::Duration;

use hyper::header::{HeaderMap, CONNECTION};

/// `Keep-Alive` response header (RFC 2068 §19.7.1); not in `http`'s constants.
const KEEP_ALIVE: &str = "keep-alive";

/// Decides the keep-alive duration of a connection from the response it
/// just carried. Plain closures implement it.
pub trait KeepAliveStrategy: Send + Sync {
    fn duration_for(&self, headers: &HeaderMap) -> Duration;
}

impl<F> KeepAliveStrategy for F
where
    F: Fn(&HeaderMap) -> Duration + Send + Sync,
{
    fn duration_for(&self, headers: &HeaderMap) -> Duration {
        self(headers)
    }
}

/// Uses the peer's `Keep-Alive: timeout=<secs>` when present and a
/// configured default otherwise. `Connection: close` yields zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultKeepAlive {
    default: Duration,
}

impl DefaultKeepAlive {
    pub fn new(default: Duration) -> Self {
        Self { default }
    }

    /// The duration advertised by the peer, if any.
    pub fn advertised(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get_all(KEEP_ALIVE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("timeout"))
            .and_then(|(_, secs)| secs.trim().trim_matches('"').parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    fn closes(headers: &HeaderMap) -> bool {
        headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("close"))
    }
}

impl KeepAliveStrategy for DefaultKeepAlive {
    fn duration_for(&self, headers: &HeaderMap) -> Duration {
        if Self::closes(headers) {
            return Duration::ZERO;
        }
        Self::advertised(headers).unwrap_or(self.default)
    }
}
