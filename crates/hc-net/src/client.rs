//! Client facade: dispatch, redirects, connection introspection and release.

use crate::config::ClientConfig;
use crate::config::DEFAULT_MAX_REDIRECTS;
use crate::config::RedirectPolicy;
use crate::connection::Connection;
use crate::dialer::Dialer;
use crate::dialer::TcpDialer;
use crate::dns::DnsResolver;
use crate::dns::SystemDnsResolver;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::pool::PoolStats;
use crate::tls_backend::RustlsTlsAdapter;
use crate::tls_backend::TlsBackendAdapter;
use crate::transport::RoundTrip;
use crate::transport::Transport;
use crate::url::RequestUrl;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::sync::Arc;

/// Rejects a redirect once more than `DEFAULT_MAX_REDIRECTS` hops were taken.
pub fn default_redirect_policy(next: &HttpRequest, via: &[HttpRequest]) -> ClientResult<()> {
    check_redirect_limit(DEFAULT_MAX_REDIRECTS, next, via)
}

/// Redirect policy allowing at most `max` followed redirects.
pub fn redirect_limit(max: usize) -> RedirectPolicy {
    Arc::new(move |next: &HttpRequest, via: &[HttpRequest]| check_redirect_limit(max, next, via))
}

fn check_redirect_limit(max: usize, next: &HttpRequest, via: &[HttpRequest]) -> ClientResult<()> {
    if via.len() > max {
        return Err(ClientError::new(
            ErrorKind::TooManyRedirects,
            "net.client.too_many_redirects",
            format!("stopped after {max} redirects before `{}`", next.url),
        ));
    }

    Ok(())
}

/// HTTP client with bounded connect and exchange time and access to the
/// connection behind each request.
///
/// Every successful `execute`, `get` or `post` leaves the connection bound to
/// the request until `finish_request` is called exactly once for it.
pub struct Client<R = SystemDnsResolver, D = TcpDialer, A = RustlsTlsAdapter>
where
    R: DnsResolver,
    D: Dialer,
    A: TlsBackendAdapter,
{
    transport: Transport<R, D, A>,
    redirect_policy: RedirectPolicy,
}

impl Client {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_parts(SystemDnsResolver, TcpDialer, RustlsTlsAdapter, config)
    }
}

impl<R, D, A> Client<R, D, A>
where
    R: DnsResolver,
    D: Dialer,
    A: TlsBackendAdapter,
{
    pub fn with_parts(dns: R, dialer: D, tls_adapter: A, config: ClientConfig) -> ClientResult<Self> {
        let redirect_policy = config
            .redirect_policy
            .clone()
            .unwrap_or_else(|| redirect_limit(config.max_redirects));
        let transport = Transport::with_parts(dns, dialer, tls_adapter, config)?;

        Ok(Self {
            transport,
            redirect_policy,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    /// Sends `request`, following redirects.
    ///
    /// The returned response's `request` is the final hop; it shares the id
    /// of `request`, so either may be passed to `get_conn`/`finish_request`.
    pub fn execute(&self, request: &HttpRequest) -> ClientResult<HttpResponse> {
        let mut via: Vec<HttpRequest> = Vec::new();
        let mut current = request.clone();

        loop {
            let response = self.transport.round_trip(&current)?;
            self.mark_reusability(&response);

            let Some(location) = redirect_location(&response) else {
                return Ok(response);
            };

            // Intermediate hops are released here; only the final hop stays bound.
            self.transport.finish(current.id())?;
            let next = redirect_request(&response, &location)?;
            via.push(current);
            (self.redirect_policy)(&next, &via)?;

            tracing::debug!(
                request = %next.id(),
                status = response.status.as_u16(),
                location = %next.url,
                hops = via.len(),
                "following redirect"
            );
            current = next;
        }
    }

    pub fn get(&self, url: &str) -> ClientResult<HttpResponse> {
        self.execute(&HttpRequest::get(url)?)
    }

    pub fn post(
        &self,
        url: &str,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) -> ClientResult<HttpResponse> {
        let request = HttpRequest::builder(HttpMethod::Post, RequestUrl::parse(url)?)
            .header("Content-Type", content_type)?
            .body(body.into())
            .build()?;
        self.execute(&request)
    }

    /// Connection serving `request`. Fails with `NotBound` before dispatch
    /// and after `finish_request`.
    pub fn get_conn(&self, request: &HttpRequest) -> ClientResult<Connection> {
        self.transport.connection_for(request.id())
    }

    /// Releases the connection of a completed request: back to the cache, or
    /// closed if it was marked `should_close`. A second call fails with
    /// `NotBound`.
    pub fn finish_request(&self, request: &HttpRequest) -> ClientResult<()> {
        self.transport.finish(request.id())
    }

    /// Stops the cancellation worker and closes idle connections.
    pub fn close(&self) -> ClientResult<()> {
        self.transport.close();
        Ok(())
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.transport.stats()
    }

    fn mark_reusability(&self, response: &HttpResponse) {
        if !self.config().disable_keep_alives && response.is_keep_alive() {
            return;
        }

        if let Ok(connection) = self.transport.connection_for(response.request.id()) {
            connection.mark_should_close();
        }
    }
}

fn redirect_location(response: &HttpResponse) -> Option<String> {
    if !response.status.is_redirect() {
        return None;
    }

    response.location().map(str::to_owned)
}

fn redirect_request(response: &HttpResponse, location: &str) -> ClientResult<HttpRequest> {
    let previous = &response.request;
    let url = previous.url.join(location)?;

    let keeps_method = matches!(response.status.as_u16(), 307 | 308)
        || matches!(previous.method, HttpMethod::Get | HttpMethod::Head);
    if keeps_method {
        previous.redirect_to(previous.method, url, previous.body.clone())
    } else {
        previous.redirect_to(HttpMethod::Get, url, Vec::new())
    }
}
