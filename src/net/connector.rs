//! Dialling new connections: DNS → TCP → optional TLS → HTTP/1.1 handshake.

use std::io;
use std::net::SocketAddr;

use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;

use crate::error::{FaultKind, TransportFault};
use crate::net::connection::HttpConnection;
use crate::net::{fault, tls, Connector};
use crate::pool::{Route, Scheme};

/// Dials plain and TLS HTTP/1.1 connections.
///
/// The overall deadline is applied by the pool; this type only classifies
/// what goes wrong.
#[derive(Clone)]
pub struct HttpConnector {
    tls: TlsConnector,
}

impl HttpConnector {
    pub fn new() -> Result<Self, rustls::Error> {
        Ok(Self {
            tls: tls::client_connector()?,
        })
    }
}

impl Connector for HttpConnector {
    type Connection = HttpConnection;

    async fn connect(
        &self,
        route: &Route,
        closing: watch::Receiver<bool>,
    ) -> Result<HttpConnection, TransportFault> {
        let addrs = resolve(route).await?;
        let stream = connect_tcp(route, &addrs).await?;
        let _ = stream.set_nodelay(true);

        match route.scheme() {
            Scheme::Http => handshake(stream, route, closing).await,
            Scheme::Https => {
                let server_name = ServerName::try_from(route.host().to_string()).map_err(|e| {
                    TransportFault::new(
                        FaultKind::TlsHandshake,
                        format!("invalid server name `{}`: {}", route.host(), e),
                    )
                })?;
                let stream = self
                    .tls
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| fault::from_handshake(&e))?;
                handshake(stream, route, closing).await
            }
        }
    }
}

async fn resolve(route: &Route) -> Result<Vec<SocketAddr>, TransportFault> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((route.host(), route.port()))
        .await
        .map_err(|e| {
            TransportFault::new(
                FaultKind::UnresolvableHost,
                format!("cannot resolve {}: {}", route.host(), e),
            )
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportFault::new(
            FaultKind::UnresolvableHost,
            format!("no addresses found for {}", route.host()),
        ));
    }
    Ok(addrs)
}

/// Try each resolved address in order; the last error is reported.
async fn connect_tcp(route: &Route, addrs: &[SocketAddr]) -> Result<TcpStream, TransportFault> {
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                tracing::trace!(route = %route, %addr, "TCP connection established");
                return Ok(stream);
            }
            Err(e) => {
                tracing::trace!(route = %route, %addr, error = %e, "TCP connect failed");
                last_error = Some(e);
            }
        }
    }
    let err = last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address to connect to"));
    Err(fault::from_io(&err))
}

async fn handshake<S>(
    stream: S,
    route: &Route,
    mut closing: watch::Receiver<bool>,
) -> Result<HttpConnection, TransportFault>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| fault::from_hyper(&e))?;

    let label = route.to_string();
    tokio::spawn(async move {
        tokio::select! {
            result = conn => {
                if let Err(e) = result {
                    tracing::trace!(route = %label, error = %e, "Connection closed with error");
                }
            }
            _ = closing.wait_for(|closed| *closed) => {
                tracing::trace!(route = %label, "Connection closed by pool shutdown");
            }
        }
    });

    Ok(HttpConnection::new(route.clone(), sender))
}
