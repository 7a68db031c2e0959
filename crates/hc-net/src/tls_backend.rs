//! TLS backend adapter and rustls implementation.

use crate::connection::BoxedIoStream;
use crate::tls::TlsSettings;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::net::TcpStream;

#[cfg(feature = "tls-rustls")]
use crate::tls::TlsVersion;
#[cfg(feature = "tls-rustls")]
use crate::tls::TrustStoreMode;
#[cfg(feature = "tls-rustls")]
use rustls::DigitallySignedStruct;
#[cfg(feature = "tls-rustls")]
use rustls::Error as RustlsError;
#[cfg(feature = "tls-rustls")]
use rustls::RootCertStore;
#[cfg(feature = "tls-rustls")]
use rustls::SignatureScheme;
#[cfg(feature = "tls-rustls")]
use rustls::SupportedProtocolVersion;
#[cfg(feature = "tls-rustls")]
use rustls::client::WebPkiServerVerifier;
#[cfg(feature = "tls-rustls")]
use rustls::client::danger::HandshakeSignatureValid;
#[cfg(feature = "tls-rustls")]
use rustls::client::danger::ServerCertVerified;
#[cfg(feature = "tls-rustls")]
use rustls::client::danger::ServerCertVerifier;
#[cfg(feature = "tls-rustls")]
use rustls::crypto::CryptoProvider;
#[cfg(feature = "tls-rustls")]
use rustls::pki_types::CertificateDer;
#[cfg(feature = "tls-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "tls-rustls")]
use rustls::pki_types::UnixTime;
#[cfg(feature = "tls-rustls")]
use std::sync::Arc;

/// Adapter contract for upgrading a dialed TCP stream to TLS.
///
/// Implementations perform the handshake and verify the peer against
/// `server_name` unless the settings disable verification.
pub trait TlsBackendAdapter: Send + Sync {
    fn connect_tls(
        &self,
        stream: TcpStream,
        server_name: &str,
        settings: &TlsSettings,
    ) -> ClientResult<BoxedIoStream>;
}

/// rustls-backed TLS connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustlsTlsAdapter;

#[cfg(feature = "tls-rustls")]
impl TlsBackendAdapter for RustlsTlsAdapter {
    fn connect_tls(
        &self,
        mut stream: TcpStream,
        server_name: &str,
        settings: &TlsSettings,
    ) -> ClientResult<BoxedIoStream> {
        use rustls::ClientConfig;
        use rustls::ClientConnection;
        use rustls::StreamOwned;

        let versions = supported_versions(settings.minimum_version, settings.maximum_version)?;
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

        let verifier: Arc<dyn ServerCertVerifier> = if settings.insecure_skip_verify {
            Arc::new(SkipVerification {
                provider: provider.clone(),
            })
        } else {
            let roots = Arc::new(root_store(settings)?);
            WebPkiServerVerifier::builder_with_provider(roots, provider.clone())
                .build()
                .map_err(|error| {
                    ClientError::new(
                        ErrorKind::HandshakeFailure,
                        "net.tls.verifier_build_failed",
                        format!("failed to build rustls verifier: {error}"),
                    )
                })?
        };

        let mut config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&versions)
            .map_err(|error| {
                ClientError::new(
                    ErrorKind::InvalidConfig,
                    "net.tls.config_versions_invalid",
                    format!("failed to configure TLS protocol versions: {error}"),
                )
            })?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();
        config.alpn_protocols = settings
            .alpn_protocols
            .iter()
            .map(|value| value.as_bytes().to_vec())
            .collect();

        let name = ServerName::try_from(server_name.to_owned()).map_err(|error| {
            ClientError::new(
                ErrorKind::VerificationFailure,
                "net.tls.server_name_invalid",
                format!("invalid TLS server name `{server_name}`: {error}"),
            )
        })?;

        let mut connection = ClientConnection::new(Arc::new(config), name).map_err(|error| {
            ClientError::new(
                ErrorKind::HandshakeFailure,
                "net.tls.connection_init_failed",
                format!("failed to initialize TLS connection for `{server_name}`: {error}"),
            )
        })?;

        connection
            .complete_io(&mut stream)
            .map_err(|error| handshake_failure(server_name, &error))?;

        tracing::debug!(server_name, "TLS handshake complete");
        Ok(Box::new(StreamOwned::new(connection, stream)))
    }
}

/// Certificate problems are verification failures and a stalled peer is a
/// connect timeout; everything else is a failed handshake.
#[cfg(feature = "tls-rustls")]
fn handshake_failure(server_name: &str, error: &std::io::Error) -> ClientError {
    let rejected_certificate = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<RustlsError>())
        .is_some_and(|inner| matches!(inner, RustlsError::InvalidCertificate(_)));

    if rejected_certificate {
        return ClientError::new(
            ErrorKind::VerificationFailure,
            "net.tls.verification_failed",
            format!("peer certificate for `{server_name}` was rejected: {error}"),
        );
    }

    if matches!(
        error.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    ) {
        return ClientError::new(
            ErrorKind::ConnectTimeout,
            "net.tls.handshake_timeout",
            format!("TLS handshake with `{server_name}` did not complete in time: {error}"),
        );
    }

    ClientError::new(
        ErrorKind::HandshakeFailure,
        "net.tls.handshake_failed",
        format!("TLS handshake failed for `{server_name}`: {error}"),
    )
}

#[cfg(feature = "tls-rustls")]
#[derive(Debug)]
struct SkipVerification {
    provider: Arc<CryptoProvider>,
}

#[cfg(feature = "tls-rustls")]
impl ServerCertVerifier for SkipVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(feature = "tls-rustls")]
fn root_store(settings: &TlsSettings) -> ClientResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if matches!(settings.trust_store_mode, TrustStoreMode::WebPkiAndOs) {
        let native = rustls_native_certs::load_native_certs();
        if native.certs.is_empty() && !native.errors.is_empty() {
            let details = native
                .errors
                .iter()
                .map(std::string::ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ClientError::new(
                ErrorKind::HandshakeFailure,
                "net.tls.os_roots_load_failed",
                format!("failed to load operating-system roots: {details}"),
            ));
        }

        for cert in native.certs {
            add_root(&mut roots, cert)?;
        }
    }

    for der in &settings.additional_roots {
        add_root(&mut roots, CertificateDer::from(der.clone()))?;
    }

    Ok(roots)
}

#[cfg(feature = "tls-rustls")]
fn add_root(roots: &mut RootCertStore, cert: CertificateDer<'static>) -> ClientResult<()> {
    roots.add(cert).map_err(|error| {
        ClientError::new(
            ErrorKind::InvalidConfig,
            "net.tls.root_add_failed",
            format!("failed to add trust anchor: {error}"),
        )
    })
}

#[cfg(feature = "tls-rustls")]
fn to_rustls_version(version: TlsVersion) -> &'static SupportedProtocolVersion {
    match version {
        TlsVersion::V1_2 => &rustls::version::TLS12,
        TlsVersion::V1_3 => &rustls::version::TLS13,
    }
}

#[cfg(feature = "tls-rustls")]
fn supported_versions(
    minimum: TlsVersion,
    maximum: TlsVersion,
) -> ClientResult<Vec<&'static SupportedProtocolVersion>> {
    let versions: Vec<_> = [TlsVersion::V1_3, TlsVersion::V1_2]
        .into_iter()
        .filter(|version| *version >= minimum && *version <= maximum)
        .map(to_rustls_version)
        .collect();

    if versions.is_empty() {
        return Err(ClientError::new(
            ErrorKind::InvalidConfig,
            "net.tls.version_set_empty",
            "no supported TLS versions match the requested settings",
        ));
    }

    Ok(versions)
}

#[cfg(not(feature = "tls-rustls"))]
impl TlsBackendAdapter for RustlsTlsAdapter {
    fn connect_tls(
        &self,
        _stream: TcpStream,
        _server_name: &str,
        _settings: &TlsSettings,
    ) -> ClientResult<BoxedIoStream> {
        Err(ClientError::new(
            ErrorKind::HandshakeFailure,
            "net.tls.backend_unavailable",
            "rustls backend is disabled for this build; enable `hc-net/tls-rustls`",
        ))
    }
}

#[cfg(all(test, feature = "tls-rustls"))]
mod tests {
    use super::handshake_failure;
    use super::supported_versions;
    use crate::tls::TlsVersion;
    use hc_core::ErrorKind;
    use rustls::CertificateError;
    use rustls::Error as RustlsError;
    use std::io;

    #[test]
    fn version_range_selects_expected_protocols() {
        assert!(matches!(supported_versions(TlsVersion::V1_2, TlsVersion::V1_3), Ok(v) if v.len() == 2));
        assert!(matches!(supported_versions(TlsVersion::V1_3, TlsVersion::V1_3), Ok(v) if v.len() == 1));
        assert!(supported_versions(TlsVersion::V1_3, TlsVersion::V1_2).is_err());
    }

    #[test]
    fn certificate_rejection_is_a_verification_failure() {
        let rejected = io::Error::new(
            io::ErrorKind::InvalidData,
            RustlsError::InvalidCertificate(CertificateError::NotValidForName),
        );
        assert_eq!(
            handshake_failure("a.test", &rejected).kind(),
            ErrorKind::VerificationFailure
        );

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(
            handshake_failure("a.test", &reset).kind(),
            ErrorKind::HandshakeFailure
        );
    }

    #[test]
    fn stalled_handshake_is_a_connect_timeout() {
        for kind in [io::ErrorKind::TimedOut, io::ErrorKind::WouldBlock] {
            let stalled = handshake_failure("a.test", &io::Error::new(kind, "stalled"));
            assert_eq!(stalled.kind(), ErrorKind::ConnectTimeout);
            assert_eq!(stalled.code, "net.tls.handshake_timeout");
        }
    }
}
