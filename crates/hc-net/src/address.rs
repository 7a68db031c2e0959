//! Canonical dial targets used to key the connection cache.

use crate::url::RequestUrl;
use crate::url::Scheme;
use std::fmt;

/// Normalized `host:port` string. Always carries an explicit port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalAddress(String);

impl CanonicalAddress {
    /// Appends the scheme's default port unless `host` already names one.
    ///
    /// A port is present when the last `:` comes after the last `]`, which
    /// keeps bracketed IPv6 literals such as `[::1]` intact.
    pub fn new(host: &str, scheme: Scheme) -> Self {
        if has_port(host) {
            return Self(host.to_owned());
        }

        Self(format!("{host}:{}", scheme.default_port()))
    }

    pub fn from_url(url: &RequestUrl) -> Self {
        Self::new(&format!("{}:{}", url.host(), url.port()), url.scheme())
    }

    /// Key of a `CONNECT` tunnel to `target` opened on `proxy`.
    pub fn tunnel(proxy: &CanonicalAddress, target: &CanonicalAddress) -> Self {
        Self(format!("{proxy}->{target}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_port(host: &str) -> bool {
    match (host.rfind(':'), host.rfind(']')) {
        (Some(colon), Some(bracket)) => colon > bracket,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
