//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Pool needs a new connection for a route
//!     → connector.rs (DNS → TCP → optional TLS → HTTP/1.1 handshake)
//!     → tls.rs (rustls client configuration, webpki roots)
//!     → connection.rs (HttpConnection: one request at a time)
//!     → fault.rs (every failure classified into a FaultKind)
//! ```
//!
//! # Design Decisions
//! - The pool is generic over [`Connector`], so tests dial in-memory fakes
//! - Failures are classified where they happen, never by parsing messages
//! - Connection drivers watch the pool's closing signal so shutdown tears
//!   down in-flight connections instead of leaving them to hang

use std::future::Future;

use hyper::body::Bytes;
use hyper::{Request, Response};
use tokio::sync::watch;

use crate::error::TransportFault;
use crate::pool::Route;

pub mod connection;
pub mod connector;
pub mod fault;
pub mod tls;

pub use connection::{ConnectionId, HttpConnection};
pub use connector::HttpConnector;

/// One reusable link to a route, used by a single request at a time.
pub trait Transport: Send + 'static {
    /// Send a request and read the complete response.
    fn send(
        &mut self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, TransportFault>> + Send;

    /// False once the peer or the driver has closed the link.
    fn is_open(&self) -> bool;
}

/// Opens new transport links for the pool.
pub trait Connector: Send + Sync + 'static {
    type Connection: Transport;

    /// Dial `route`. The connection must close once `closing` turns true.
    fn connect(
        &self,
        route: &Route,
        closing: watch::Receiver<bool>,
    ) -> impl Future<Output = Result<Self::Connection, TransportFault>> + Send;
}
