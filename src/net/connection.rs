//! Pooled HTTP/1.1 connections.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Send one request at a time over a hyper HTTP/1.1 sender
//! - Read complete responses so the link can be reused
//! - Report whether the link is still usable

use std::sync::atomic::{AtomicU64, Ordering};

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{HeaderValue, HOST};
use hyper::{Request, Response, Uri};

use crate::error::TransportFault;
use crate::net::{fault, Transport};
use crate::pool::Route;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one pooled connection across its lease/idle cycles in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Ids only need to be distinct; they order nothing.
    pub fn new() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// An HTTP/1.1 connection to one route.
pub struct HttpConnection {
    route: Route,
    sender: http1::SendRequest<Full<Bytes>>,
}

impl HttpConnection {
    pub(crate) fn new(route: Route, sender: http1::SendRequest<Full<Bytes>>) -> Self {
        Self { route, sender }
    }
}

impl Transport for HttpConnection {
    async fn send(&mut self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportFault> {
        // A pooled link the peer closed while idle fails here, before the
        // request is written.
        self.sender.ready().await.map_err(|e| fault::from_hyper(&e))?;

        let request = into_origin_form(request, &self.route).map(Full::new);
        let response = self
            .sender
            .send_request(request)
            .await
            .map_err(|e| fault::from_hyper(&e))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| fault::from_hyper(&e))?
            .to_bytes();
        Ok(Response::from_parts(parts, body))
    }

    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Rewrite an absolute-form request for direct sending: origin-form target
/// and a `Host` header.
fn into_origin_form(mut request: Request<Bytes>, route: &Route) -> Request<Bytes> {
    if !request.headers().contains_key(HOST) {
        if let Ok(host) = HeaderValue::from_str(&route.authority()) {
            request.headers_mut().insert(HOST, host);
        }
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    if let Ok(uri) = target.parse::<Uri>() {
        *request.uri_mut() = uri;
    }
    request
}
