//! Request dispatch through the connection table and deadline machinery.

use crate::address::CanonicalAddress;
use crate::config::ClientConfig;
use crate::connection::BoxedIoStream;
use crate::connection::CachedConnection;
use crate::connection::Connection;
use crate::dialer::Dialer;
use crate::dialer::TcpDialer;
use crate::dialer::connect_first_available;
use crate::dns::DnsResolver;
use crate::dns::SystemDnsResolver;
use crate::http::Header;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::RequestId;
use crate::pool::ConnectionTable;
use crate::pool::PoolStats;
use crate::proxy;
use crate::proxy::Route;
use crate::scheduler::CancellationScheduler;
use crate::tls_backend::RustlsTlsAdapter;
use crate::tls_backend::TlsBackendAdapter;
use crate::wire;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::sync::Arc;
use std::time::Instant;

const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Sends one request hop and returns its response.
///
/// The connection that served the hop stays bound to the request id until
/// the caller finishes or the hop fails.
pub trait RoundTrip: Send + Sync {
    fn round_trip(&self, request: &HttpRequest) -> ClientResult<HttpResponse>;
}

/// HTTP/1.1 dispatcher with pluggable resolver, dialer and TLS backend.
pub struct Transport<R = SystemDnsResolver, D = TcpDialer, A = RustlsTlsAdapter>
where
    R: DnsResolver,
    D: Dialer,
    A: TlsBackendAdapter,
{
    dns: R,
    dialer: D,
    tls_adapter: A,
    config: ClientConfig,
    table: Arc<ConnectionTable>,
    scheduler: CancellationScheduler,
}

impl Transport {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_parts(SystemDnsResolver, TcpDialer, RustlsTlsAdapter, config)
    }
}

impl<R, D, A> Transport<R, D, A>
where
    R: DnsResolver,
    D: Dialer,
    A: TlsBackendAdapter,
{
    pub fn with_parts(dns: R, dialer: D, tls_adapter: A, config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        let table = Arc::new(ConnectionTable::new(config.max_conns_per_host));
        let cancel_table = Arc::clone(&table);
        let scheduler = CancellationScheduler::new(
            config.cancel_tick,
            Arc::new(move |request: RequestId| cancel_table.cancel(request)),
        );

        Ok(Self {
            dns,
            dialer,
            tls_adapter,
            config,
            table,
            scheduler,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection_for(&self, request: RequestId) -> ClientResult<Connection> {
        self.table.lookup(request)
    }

    pub fn finish(&self, request: RequestId) -> ClientResult<()> {
        self.table.finish(request)
    }

    pub fn stats(&self) -> PoolStats {
        self.table.stats()
    }

    pub fn pending_deadlines(&self) -> usize {
        self.scheduler.pending()
    }

    /// Stops the cancellation worker and closes idle connections.
    pub fn close(&self) {
        self.scheduler.stop();
        self.table.close();
    }

    fn open_connection(
        &self,
        request: &HttpRequest,
        route: &Route,
        address: &CanonicalAddress,
    ) -> ClientResult<Connection> {
        let url = &request.url;
        let timeout = self.config.connect_timeout;
        let dial = route.dial_target(url);
        let addresses = self.dns.resolve(dial.host(), dial.port())?;
        let mut tcp = connect_first_available(&self.dialer, &addresses, timeout)?;

        let control = tcp.try_clone().map_err(|error| {
            ClientError::new(
                ErrorKind::Io,
                "net.transport.socket_clone_failed",
                format!("failed to clone socket for `{address}`: {error}"),
            )
        })?;

        let stream: BoxedIoStream = if url.is_secure() {
            // Tunnel setup and handshake share the connect budget.
            control
                .set_read_timeout(Some(timeout))
                .and_then(|()| control.set_write_timeout(Some(timeout)))
                .map_err(|error| {
                    ClientError::new(
                        ErrorKind::Io,
                        "net.transport.handshake_timeout_failed",
                        format!("failed to bound TLS handshake for `{address}`: {error}"),
                    )
                })?;
            if let Route::Tunnel(_) = route {
                proxy::establish_tunnel(&mut tcp, url)?;
            }
            let server_name = self.config.tls.server_name_for(url.bare_host());
            self.tls_adapter
                .connect_tls(tcp, server_name, &self.config.tls)?
        } else {
            Box::new(tcp)
        };

        let connection = CachedConnection::new(address.clone(), control, stream, url.is_secure());
        tracing::debug!(
            address = %address,
            connection = connection.id(),
            secure = url.is_secure(),
            proxied = !matches!(route, Route::Direct),
            "dialed new connection"
        );
        Ok(Arc::new(connection))
    }

    fn extra_headers(&self, request: &HttpRequest) -> ClientResult<(Vec<Header>, bool)> {
        let mut headers = Vec::new();
        let mut decode = false;

        if !self.config.disable_compression && request.header("accept-encoding").is_none() {
            headers.push(Header::new("Accept-Encoding", ACCEPT_ENCODING)?);
            decode = true;
        }

        if self.config.disable_keep_alives && !request.wants_close() {
            headers.push(Header::new("Connection", "close")?);
        }

        Ok((headers, decode))
    }

    fn exchange(
        &self,
        connection: &CachedConnection,
        request: &HttpRequest,
        absolute_form: bool,
    ) -> ClientResult<HttpResponse> {
        let (extra, decode) = self.extra_headers(request)?;
        let deadline = self
            .config
            .read_write_timeout
            .map(|timeout| Instant::now() + timeout);
        let header_timeout = self.config.response_header_timeout;

        connection.exchange(deadline, |stream| -> ClientResult<HttpResponse> {
            wire::write_request(stream, request, absolute_form, &extra)?;

            if let Some(timeout) = header_timeout {
                let head_deadline = Instant::now() + timeout;
                stream.set_deadline(Some(
                    deadline.map_or(head_deadline, |overall| overall.min(head_deadline)),
                ));
            }
            let (head, prefetched) = wire::read_response_head(stream)?;
            stream.set_deadline(deadline);

            let body = wire::read_response_body(stream, &head, prefetched, request.method, decode)?;
            Ok(HttpResponse {
                version: head.version,
                status: head.status,
                headers: head.headers,
                body,
                request: request.clone(),
            })
        })
    }
}

impl<R, D, A> RoundTrip for Transport<R, D, A>
where
    R: DnsResolver,
    D: Dialer,
    A: TlsBackendAdapter,
{
    fn round_trip(&self, request: &HttpRequest) -> ClientResult<HttpResponse> {
        let started = Instant::now();
        let id = request.id();
        let route = Route::select(self.config.proxy.as_ref(), request)?;
        let address = route.cache_key(&request.url);

        let connection = match self.table.checkout(&address)? {
            Some(connection) => connection,
            None => match self.open_connection(request, &route, &address) {
                Ok(connection) => connection,
                Err(error) => {
                    self.table.abandon(&address);
                    tracing::warn!(request = %id, address = %address, error = %error, "dial failed");
                    return Err(error);
                }
            },
        };

        // Bound before any I/O so the connection is visible while in flight.
        self.table.bind(id, Arc::clone(&connection))?;

        let scheduled = match self.config.request_timeout {
            Some(timeout) => match self.scheduler.schedule(id, started + timeout) {
                Ok(handle) => Some(handle),
                Err(error) => {
                    self.table.fail(id, &connection);
                    return Err(error);
                }
            },
            None => None,
        };

        let outcome = self.exchange(&connection, request, route.uses_absolute_form());

        if let Some(handle) = scheduled {
            self.scheduler.unschedule(handle);
        }

        outcome.map_err(|error| {
            let error = if connection.is_cancelled() {
                ClientError::new(
                    ErrorKind::Cancelled,
                    "net.transport.cancelled",
                    format!(
                        "request to `{address}` exceeded its {:?} deadline: {error}",
                        self.config.request_timeout.unwrap_or_default()
                    ),
                )
            } else {
                error
            };

            tracing::warn!(
                request = %id,
                address = %address,
                kind = %error.kind(),
                error = %error,
                "exchange failed; closing connection"
            );
            self.table.fail(id, &connection);
            error
        })
    }
}
