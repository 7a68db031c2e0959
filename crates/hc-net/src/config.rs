//! Client configuration.

use crate::http::HttpRequest;
use crate::proxy::ProxyFn;
use crate::scheduler::DEFAULT_TICK;
use crate::tls::TlsSettings;
use crate::url::RequestUrl;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONNS_PER_HOST: usize = 16;
pub const DEFAULT_MAX_REDIRECTS: usize = 3;

/// Decides whether to follow a redirect to `next`, given the hops already
/// taken (oldest first).
pub type RedirectPolicy =
    Arc<dyn Fn(&HttpRequest, &[HttpRequest]) -> ClientResult<()> + Send + Sync>;

/// Settings fixed at client construction.
#[derive(Clone)]
pub struct ClientConfig {
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Deadline set on the connection for the whole write and read of one hop.
    pub read_write_timeout: Option<Duration>,
    /// Whole-request deadline enforced by the cancellation scheduler.
    pub request_timeout: Option<Duration>,
    /// Bound on waiting for the response head once the request is written.
    pub response_header_timeout: Option<Duration>,
    /// Maximum outstanding connections per canonical address; also caps the
    /// idle list.
    pub max_conns_per_host: usize,
    /// Hop limit used by the default redirect policy.
    pub max_redirects: usize,
    pub disable_keep_alives: bool,
    /// Stops the transport from requesting and decoding compressed bodies.
    pub disable_compression: bool,
    pub tls: TlsSettings,
    /// Custom redirect predicate; `None` uses the `max_redirects` limit.
    pub redirect_policy: Option<RedirectPolicy>,
    /// Proxy selector; `None` dials every origin directly.
    pub proxy: Option<ProxyFn>,
    /// Wake interval of the cancellation worker.
    pub cancel_tick: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_write_timeout: None,
            request_timeout: None,
            response_header_timeout: None,
            max_conns_per_host: DEFAULT_MAX_CONNS_PER_HOST,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            disable_keep_alives: false,
            disable_compression: false,
            tls: TlsSettings::default(),
            redirect_policy: None,
            proxy: None,
            cancel_tick: DEFAULT_TICK,
        }
    }
}

impl ClientConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_write_timeout(mut self, timeout: Duration) -> Self {
        self.read_write_timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_response_header_timeout(mut self, timeout: Duration) -> Self {
        self.response_header_timeout = Some(timeout);
        self
    }

    pub fn with_max_conns_per_host(mut self, max: usize) -> Self {
        self.max_conns_per_host = max;
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_keep_alives_disabled(mut self, disabled: bool) -> Self {
        self.disable_keep_alives = disabled;
        self
    }

    pub fn with_compression_disabled(mut self, disabled: bool) -> Self {
        self.disable_compression = disabled;
        self
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_redirect_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&HttpRequest, &[HttpRequest]) -> ClientResult<()> + Send + Sync + 'static,
    {
        self.redirect_policy = Some(Arc::new(policy));
        self
    }

    pub fn with_proxy<F>(mut self, proxy: F) -> Self
    where
        F: Fn(&HttpRequest) -> ClientResult<Option<RequestUrl>> + Send + Sync + 'static,
    {
        self.proxy = Some(Arc::new(proxy));
        self
    }

    pub fn with_cancel_tick(mut self, tick: Duration) -> Self {
        self.cancel_tick = tick;
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        ensure_positive("connect_timeout", Some(self.connect_timeout))?;
        ensure_positive("read_write_timeout", self.read_write_timeout)?;
        ensure_positive("request_timeout", self.request_timeout)?;
        ensure_positive("response_header_timeout", self.response_header_timeout)?;
        ensure_positive("cancel_tick", Some(self.cancel_tick))?;
        self.tls.validate()
    }
}

fn ensure_positive(name: &str, value: Option<Duration>) -> ClientResult<()> {
    if value.is_some_and(|value| value.is_zero()) {
        return Err(ClientError::new(
            ErrorKind::InvalidConfig,
            "net.config.zero_duration",
            format!("`{name}` must be greater than zero"),
        ));
    }

    Ok(())
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_write_timeout", &self.read_write_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("response_header_timeout", &self.response_header_timeout)
            .field("max_conns_per_host", &self.max_conns_per_host)
            .field("max_redirects", &self.max_redirects)
            .field("disable_keep_alives", &self.disable_keep_alives)
            .field("disable_compression", &self.disable_compression)
            .field("tls", &self.tls)
            .field("redirect_policy", &self.redirect_policy.is_some())
            .field("proxy", &self.proxy.is_some())
            .field("cancel_tick", &self.cancel_tick)
            .finish()
    }
}
