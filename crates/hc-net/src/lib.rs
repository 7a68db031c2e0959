//! Blocking HTTP/1.1 client: bounded connect and exchange time, a per-host
//! connection cache, and access to the connection serving each request.

pub mod address;
pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod dialer;
pub mod dns;
pub mod http;
pub mod pool;
pub mod pqueue;
pub mod proxy;
pub mod registry;
pub mod scheduler;
pub mod tls;
pub mod tls_backend;
pub mod transport;
pub mod url;
mod wire;

pub use address::CanonicalAddress;
pub use client::Client;
pub use client::default_redirect_policy;
pub use client::redirect_limit;
pub use config::ClientConfig;
pub use config::RedirectPolicy;
pub use connection::CachedConnection;
pub use connection::Connection;
pub use hc_core::ClientError;
pub use hc_core::ClientResult;
pub use hc_core::ErrorKind;
pub use http::Header;
pub use http::HttpMethod;
pub use http::HttpRequest;
pub use http::HttpRequestBuilder;
pub use http::HttpResponse;
pub use http::HttpStatusCode;
pub use http::HttpVersion;
pub use http::RequestId;
pub use pool::PoolStats;
pub use proxy::ProxyFn;
pub use proxy::Route;
pub use proxy::fixed_proxy;
pub use tls::TlsSettings;
pub use tls::TlsVersion;
pub use tls::TrustStoreMode;
pub use url::RequestUrl;
pub use url::Scheme;

/// Version string of this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::version;

    #[test]
    fn version_is_the_package_version() {
        assert!(!version().is_empty());
        assert_eq!(version().split('.').count(), 3);
    }
}
