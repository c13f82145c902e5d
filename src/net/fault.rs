//! Classification of I/O and HTTP transport errors into [`FaultKind`]s.

use std::error::Error as StdError;
use std::io;

use tokio_rustls::rustls;

use crate::error::{FaultKind, TransportFault};

/// Classify an I/O error raised while connecting, reading or writing.
pub fn from_io(err: &io::Error) -> TransportFault {
    let kind = if is_tls_error(err) {
        FaultKind::Tls
    } else {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => FaultKind::ConnectionRefused,
            io::ErrorKind::TimedOut => FaultKind::Timeout,
            io::ErrorKind::UnexpectedEof => FaultKind::PeerClosed,
            _ => FaultKind::Other,
        }
    };
    TransportFault::new(kind, err.to_string())
}

/// Classify an error raised during a TLS handshake.
///
/// Anything that goes wrong while negotiating TLS, including the peer hanging
/// up mid-handshake, is a handshake failure rather than a stale connection.
pub fn from_handshake(err: &io::Error) -> TransportFault {
    TransportFault::new(FaultKind::TlsHandshake, err.to_string())
}

/// Classify an error reported by hyper's HTTP/1.1 client.
pub fn from_hyper(err: &hyper::Error) -> TransportFault {
    if err.is_timeout() {
        return TransportFault::new(FaultKind::Timeout, err.to_string());
    }
    if err.is_incomplete_message() || err.is_canceled() || err.is_closed() {
        return TransportFault::new(FaultKind::PeerClosed, err.to_string());
    }
    if let Some(io_err) = find_source::<io::Error>(err) {
        let mut fault = from_io(io_err);
        fault.message = err.to_string();
        return fault;
    }
    TransportFault::new(FaultKind::Other, err.to_string())
}

fn is_tls_error(err: &io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.downcast_ref::<rustls::Error>().is_some())
}

fn find_source<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current = err.source();
    while let Some(source) = current {
        if let Some(found) = source.downcast_ref::<T>() {
            return Some(found);
        }
        current = source.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_faults() {
        let cases = [
            (io::ErrorKind::ConnectionRefused, FaultKind::ConnectionRefused),
            (io::ErrorKind::TimedOut, FaultKind::Timeout),
            (io::ErrorKind::UnexpectedEof, FaultKind::PeerClosed),
            (io::ErrorKind::ConnectionReset, FaultKind::Other),
            (io::ErrorKind::BrokenPipe, FaultKind::Other),
        ];
        for (io_kind, expected) in cases {
            let err = io::Error::new(io_kind, "boom");
            assert_eq!(from_io(&err).kind, expected, "{io_kind:?}");
        }
    }

    #[test]
    fn rustls_errors_are_tls_faults() {
        let err = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::DecryptError,
        );
        assert_eq!(from_io(&err).kind, FaultKind::Tls);
    }

    #[test]
    fn handshake_errors_are_handshake_faults() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset during handshake");
        let fault = from_handshake(&err);
        assert_eq!(fault.kind, FaultKind::TlsHandshake);
        assert!(fault.message.contains("reset during handshake"));
    }
}
