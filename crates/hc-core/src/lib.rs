//! Shared error primitives used across the httpclient crates.

use core::fmt;

/// Result alias used across the workspace.
pub type ClientResult<T> = Result<T, ClientError>;

/// Broad failure classes callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Dial did not complete within the connect timeout.
    ConnectTimeout,
    /// Peer actively refused or the route is unusable.
    ConnectRefused,
    /// Host name did not resolve.
    DnsFailure,
    HandshakeFailure,
    /// Peer certificate or host name did not verify.
    VerificationFailure,
    /// The read/write deadline elapsed mid-exchange.
    RequestTimeout,
    /// The cancellation scheduler interrupted the exchange.
    Cancelled,
    /// Per-host outstanding connection limit reached.
    CapacityExceeded,
    TooManyRedirects,
    /// No connection is bound to the request.
    NotBound,
    /// Internal invariant violation: returning a connection to an address
    /// the cache never handed out.
    UnknownAddress,
    InvalidRequest,
    InvalidConfig,
    /// Malformed or unsupported response framing.
    Protocol,
    Io,
    /// The client has been closed.
    Closed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectTimeout => "connect_timeout",
            Self::ConnectRefused => "connect_refused",
            Self::DnsFailure => "dns_failure",
            Self::HandshakeFailure => "handshake_failure",
            Self::VerificationFailure => "verification_failure",
            Self::RequestTimeout => "request_timeout",
            Self::Cancelled => "cancelled",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::TooManyRedirects => "too_many_redirects",
            Self::NotBound => "not_bound",
            Self::UnknownAddress => "unknown_address",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidConfig => "invalid_config",
            Self::Protocol => "protocol",
            Self::Io => "io",
            Self::Closed => "closed",
        }
    }

    /// Whether the failure came from the deadline machinery rather than the peer.
    pub fn is_timeout(self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout | Self::RequestTimeout | Self::Cancelled
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the client stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Re-labels the error kind while keeping code and message.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ClientError {}
