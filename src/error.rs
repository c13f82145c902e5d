//! Error taxonomy for the client.
//!
//! Transport-level failures are classified into a [`FaultKind`] as close to
//! the socket as possible (see `net::fault`) so that the retry decision and
//! the error surfaced to callers agree on what went wrong.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::Route;

/// Classification of a connection-level failure.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The peer closed the connection without sending a response.
    PeerClosed = 0,
    /// TLS negotiation failed (certificate, protocol or cipher mismatch).
    TlsHandshake = 1,
    /// Connect, read or write deadline elapsed.
    Timeout = 2,
    /// The host name could not be resolved.
    UnresolvableHost = 3,
    /// The target actively refused the connection.
    ConnectionRefused = 4,
    /// Any other TLS failure after the handshake.
    Tls = 5,
    /// An I/O failure with no more specific classification.
    Other = 6,
}

impl FaultKind {
    pub const COUNT: usize = 7;

    pub const ALL: [FaultKind; FaultKind::COUNT] = [
        FaultKind::PeerClosed,
        FaultKind::TlsHandshake,
        FaultKind::Timeout,
        FaultKind::UnresolvableHost,
        FaultKind::ConnectionRefused,
        FaultKind::Tls,
        FaultKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::PeerClosed => "peer_closed",
            FaultKind::TlsHandshake => "tls_handshake",
            FaultKind::Timeout => "timeout",
            FaultKind::UnresolvableHost => "unresolvable_host",
            FaultKind::ConnectionRefused => "connection_refused",
            FaultKind::Tls => "tls",
            FaultKind::Other => "other",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FaultKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A classified connection-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportFault {
    pub kind: FaultKind,
    pub message: String,
}

impl TransportFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`ClientHandle::execute`](crate::client::ClientHandle::execute)
/// and the pool.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No connection became available within the connection request timeout.
    #[error("no connection to {route} available within {waited:?}")]
    PoolExhausted { route: Route, waited: Duration },

    /// The pool has been shut down.
    #[error("connection pool is shut down")]
    PoolClosed,

    /// A transport fault that was not retried.
    #[error("transport fault ({0})")]
    Transport(#[from] TransportFault),

    /// Every permitted attempt failed with a retryable fault.
    #[error("request failed after {attempts} attempts, last fault ({last})")]
    RetryExhausted { attempts: u32, last: TransportFault },

    /// The request cannot be routed (missing host, unsupported scheme).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Fault kind behind this error, if it came from the transport.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            ClientError::Transport(fault) => Some(fault.kind),
            ClientError::RetryExhausted { last, .. } => Some(last.kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_kind_names_round_trip() {
        for kind in FaultKind::ALL {
            assert_eq!(kind.as_str().parse::<FaultKind>(), Ok(kind));
        }
        assert!("bogus".parse::<FaultKind>().is_err());
    }

    #[test]
    fn fault_kind_indexes_are_dense() {
        for (i, kind) in FaultKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn fault_kind_is_reported_for_transport_errors() {
        let fault = TransportFault::new(FaultKind::TlsHandshake, "bad certificate");
        assert_eq!(
            ClientError::Transport(fault.clone()).fault_kind(),
            Some(FaultKind::TlsHandshake)
        );
        assert_eq!(
            ClientError::RetryExhausted { attempts: 3, last: fault }.fault_kind(),
            Some(FaultKind::TlsHandshake)
        );
        assert_eq!(ClientError::PoolClosed.fault_kind(), None);
    }
}
