//! Connection dialing with connect-timeout enforcement.

use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::io;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::time::Duration;
use std::time::Instant;

/// Low-level strategy for opening TCP connections.
pub trait Dialer: Send + Sync {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> ClientResult<TcpStream>;
}

/// Standard library TCP dialer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> ClientResult<TcpStream> {
        let stream = TcpStream::connect_timeout(&address, timeout)
            .map_err(|error| dial_failure(address, timeout, &error))?;

        stream.set_nodelay(true).map_err(|error| {
            ClientError::new(
                ErrorKind::Io,
                "net.dial.nodelay_failed",
                format!("failed to enable TCP_NODELAY for `{address}`: {error}"),
            )
        })?;

        Ok(stream)
    }
}

/// Classifies a failed dial into the connect-timeout or refused bucket.
pub(crate) fn dial_failure(address: SocketAddr, timeout: Duration, error: &io::Error) -> ClientError {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ClientError::new(
            ErrorKind::ConnectTimeout,
            "net.dial.timeout",
            format!("connect to `{address}` did not complete within {timeout:?}"),
        ),
        _ => ClientError::new(
            ErrorKind::ConnectRefused,
            "net.dial.failed",
            format!("failed to connect to `{address}`: {error}"),
        ),
    }
}

/// Tries each resolved address in order and returns the first connection.
///
/// All attempts share one `timeout` budget; an address that would start
/// after the budget ran out is not tried.
pub(crate) fn connect_first_available<D: Dialer + ?Sized>(
    dialer: &D,
    addresses: &[SocketAddr],
    timeout: Duration,
) -> ClientResult<TcpStream> {
    let deadline = Instant::now() + timeout;
    let mut last_error: Option<ClientError> = None;

    for address in addresses {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!(address = %address, "connect budget spent; skipping address");
            break;
        }

        match dialer.connect(*address, remaining) {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                tracing::debug!(address = %address, error = %error, "dial attempt failed");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) => Err(error),
        None if addresses.is_empty() => Err(ClientError::new(
            ErrorKind::DnsFailure,
            "net.dial.no_addresses",
            "no addresses available to open a connection",
        )),
        None => Err(ClientError::new(
            ErrorKind::ConnectTimeout,
            "net.dial.timeout",
            format!("connect budget of {timeout:?} ran out before any address was tried"),
        )),
    }
}
