//! Route identity: the (scheme, host, port) a connection is bound to.

use std::fmt;

use hyper::Uri;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A pooling destination.
///
/// Hosts are stored lower-cased and without IPv6 brackets so that
/// `http://EXAMPLE.com` and `http://example.com:80` share connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Route {
    pub fn new(scheme: Scheme, host: impl AsRef<str>, port: u16) -> Self {
        let host = host
            .as_ref()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();
        Self { scheme, host, port }
    }

    /// Derive the route of an absolute request URI.
    pub fn from_uri(uri: &Uri) -> Result<Self, ClientError> {
        let scheme = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("http") => Scheme::Http,
            Some(s) if s.eq_ignore_ascii_case("https") => Scheme::Https,
            Some(other) => {
                return Err(ClientError::InvalidRequest(format!(
                    "unsupported scheme `{other}` in {uri}"
                )))
            }
            None => {
                return Err(ClientError::InvalidRequest(format!(
                    "request URI `{uri}` is not absolute"
                )))
            }
        };

        let host = match uri.host() {
            Some(host) if !host.is_empty() => host,
            _ => {
                return Err(ClientError::InvalidRequest(format!(
                    "request URI `{uri}` has no host"
                )))
            }
        };

        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());
        Ok(Self::new(scheme, host, port))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Value for the `Host` header: the default port is omitted.
    pub fn authority(&self) -> String {
        let host = self.bracketed_host();
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    fn bracketed_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}",
            self.scheme.as_str(),
            self.bracketed_host(),
            self.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(uri: &str) -> Result<Route, ClientError> {
        Route::from_uri(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn default_ports_follow_scheme() {
        let http = route("http://example.com/a").unwrap();
        assert_eq!(http.port(), 80);
        assert_eq!(http.scheme(), Scheme::Http);

        let https = route("https://example.com/a").unwrap();
        assert_eq!(https.port(), 443);
        assert_eq!(https.scheme(), Scheme::Https);
        assert_ne!(http, https);
    }

    #[test]
    fn host_case_and_explicit_default_port_share_a_route() {
        assert_eq!(
            route("http://EXAMPLE.com/").unwrap(),
            route("http://example.com:80/other").unwrap()
        );
    }

    #[test]
    fn authority_omits_default_port() {
        assert_eq!(route("http://example.com/").unwrap().authority(), "example.com");
        assert_eq!(
            route("http://example.com:8080/").unwrap().authority(),
            "example.com:8080"
        );
    }

    #[test]
    fn ipv6_hosts_are_bracketed_on_output() {
        let r = route("http://[::1]:8080/").unwrap();
        assert_eq!(r.host(), "::1");
        assert_eq!(r.authority(), "[::1]:8080");
        assert_eq!(r.to_string(), "http://[::1]:8080");
    }

    #[test]
    fn rejects_relative_and_unsupported_uris() {
        assert!(matches!(route("/just/a/path"), Err(ClientError::InvalidRequest(_))));
        assert!(matches!(route("ftp://example.com/"), Err(ClientError::InvalidRequest(_))));
    }
}
