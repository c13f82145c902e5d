//! TLS client configuration.

use std::sync::Arc;

use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

/// Build a TLS connector trusting the webpki root set.
///
/// Only HTTP/1.1 is offered over ALPN since that is what the pool speaks.
pub fn client_connector() -> Result<TlsConnector, rustls::Error> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    tracing::debug!(
        roots = webpki_roots::TLS_SERVER_ROOTS.len(),
        "TLS client configuration loaded"
    );
    Ok(TlsConnector::from(Arc::new(config)))
}
