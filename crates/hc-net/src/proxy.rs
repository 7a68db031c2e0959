//! Proxy selection and CONNECT tunnels.

use crate::address::CanonicalAddress;
use crate::http::HttpRequest;
use crate::url::RequestUrl;
use crate::wire;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::io;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;

/// Picks the proxy for a request. `Ok(None)` dials the origin directly; an
/// error aborts the dispatch.
pub type ProxyFn =
    Arc<dyn Fn(&HttpRequest) -> ClientResult<Option<RequestUrl>> + Send + Sync>;

/// Sends every request through `proxy`.
pub fn fixed_proxy(proxy: RequestUrl) -> ProxyFn {
    Arc::new(move |_: &HttpRequest| -> ClientResult<Option<RequestUrl>> {
        Ok(Some(proxy.clone()))
    })
}

/// How a request reaches its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    /// Plain HTTP handed to the proxy with an absolute-form request target.
    Forward(RequestUrl),
    /// HTTPS carried through a `CONNECT` tunnel opened on the proxy.
    Tunnel(RequestUrl),
}

impl Route {
    pub fn select(proxy: Option<&ProxyFn>, request: &HttpRequest) -> ClientResult<Self> {
        let Some(proxy) = proxy else {
            return Ok(Self::Direct);
        };
        let Some(proxy_url) = proxy(request)? else {
            return Ok(Self::Direct);
        };

        if proxy_url.is_secure() {
            return Err(ClientError::new(
                ErrorKind::InvalidConfig,
                "net.proxy.scheme_unsupported",
                format!("proxy `{proxy_url}` must use http"),
            ));
        }

        if request.url.is_secure() {
            Ok(Self::Tunnel(proxy_url))
        } else {
            Ok(Self::Forward(proxy_url))
        }
    }

    /// Cache key of connections on this route.
    ///
    /// Forwarding connections serve any plain origin, so they are keyed by
    /// the proxy alone. A tunnel only reaches the origin it was opened for.
    pub fn cache_key(&self, target: &RequestUrl) -> CanonicalAddress {
        match self {
            Self::Direct => CanonicalAddress::from_url(target),
            Self::Forward(proxy) => CanonicalAddress::from_url(proxy),
            Self::Tunnel(proxy) => CanonicalAddress::tunnel(
                &CanonicalAddress::from_url(proxy),
                &CanonicalAddress::from_url(target),
            ),
        }
    }

    /// Host and port the dialer connects to.
    pub fn dial_target<'a>(&'a self, target: &'a RequestUrl) -> &'a RequestUrl {
        match self {
            Self::Direct => target,
            Self::Forward(proxy) | Self::Tunnel(proxy) => proxy,
        }
    }

    pub fn uses_absolute_form(&self) -> bool {
        matches!(self, Self::Forward(_))
    }
}

/// Asks the proxy on `stream` to open a tunnel to `target`.
///
/// Runs within the connect budget, so deadline expiry is a connect timeout.
pub(crate) fn establish_tunnel<S: Read + Write>(stream: &mut S, target: &RequestUrl) -> ClientResult<()> {
    let authority = format!("{}:{}", target.host(), target.port());
    let connect = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");

    stream
        .write_all(connect.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|error| tunnel_io_failure(&authority, &error))?;

    let (head, prefetched) = wire::read_response_head(stream).map_err(|error| {
        if error.kind() == ErrorKind::RequestTimeout {
            error.with_kind(ErrorKind::ConnectTimeout)
        } else {
            error
        }
    })?;

    if !head.status.is_success() {
        return Err(ClientError::new(
            ErrorKind::ConnectRefused,
            "net.proxy.connect_rejected",
            format!(
                "proxy refused tunnel to `{authority}` with status {}",
                head.status.as_u16()
            ),
        ));
    }

    if !prefetched.is_empty() {
        return Err(ClientError::new(
            ErrorKind::Protocol,
            "net.proxy.unexpected_bytes",
            format!("proxy sent data before the tunnel to `{authority}` was used"),
        ));
    }

    tracing::debug!(target = %authority, "proxy tunnel established");
    Ok(())
}

fn tunnel_io_failure(authority: &str, error: &io::Error) -> ClientError {
    let kind = match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::ConnectTimeout,
        _ => ErrorKind::ConnectRefused,
    };

    ClientError::new(
        kind,
        "net.proxy.connect_failed",
        format!("failed to request tunnel to `{authority}`: {error}"),
    )
}
