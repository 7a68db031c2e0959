//! Name resolution.

use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;

/// Name resolution abstraction.
pub trait DnsResolver: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> ClientResult<Vec<SocketAddr>>;
}

/// Uses the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDnsResolver;

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> ClientResult<Vec<SocketAddr>> {
        let query = format!("{host}:{port}");
        let addresses: Vec<SocketAddr> = query
            .to_socket_addrs()
            .map_err(|error| {
                ClientError::new(
                    ErrorKind::DnsFailure,
                    "net.dns.resolve_failed",
                    format!("failed to resolve `{query}`: {error}"),
                )
            })?
            .collect();

        if addresses.is_empty() {
            return Err(ClientError::new(
                ErrorKind::DnsFailure,
                "net.dns.no_results",
                format!("resolver returned no addresses for `{query}`"),
            ));
        }

        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::DnsResolver;
    use super::SystemDnsResolver;

    #[test]
    fn resolves_ip_literals_without_lookup() {
        let resolved = SystemDnsResolver.resolve("127.0.0.1", 8080);
        assert!(resolved.is_ok());
        if let Ok(addresses) = resolved {
            assert_eq!(addresses.len(), 1);
            assert_eq!(addresses[0].port(), 8080);
        }

        let resolved = SystemDnsResolver.resolve("[::1]", 443);
        assert!(resolved.is_ok());
    }
}
