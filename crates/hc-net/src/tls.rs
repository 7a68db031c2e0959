//! TLS settings for encrypted targets.

use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;

/// Supported TLS protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    V1_2,
    V1_3,
}

impl TlsVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_2 => "TLS1.2",
            Self::V1_3 => "TLS1.3",
        }
    }
}

/// Controls which trust anchors are used for server certificate verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStoreMode {
    /// Use only the embedded Mozilla/WebPKI roots.
    WebPkiOnly,
    /// Use WebPKI roots and merge operating-system roots (enterprise/local CAs).
    WebPkiAndOs,
}

/// Client-side TLS configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    /// Skips certificate chain and host name verification entirely.
    pub insecure_skip_verify: bool,
    /// Name to verify instead of the request host.
    pub server_name: Option<String>,
    pub minimum_version: TlsVersion,
    pub maximum_version: TlsVersion,
    pub alpn_protocols: Vec<String>,
    pub trust_store_mode: TrustStoreMode,
    /// DER-encoded extra trust anchors.
    pub additional_roots: Vec<Vec<u8>>,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            insecure_skip_verify: false,
            server_name: None,
            minimum_version: TlsVersion::V1_2,
            maximum_version: TlsVersion::V1_3,
            alpn_protocols: vec!["http/1.1".to_owned()],
            trust_store_mode: TrustStoreMode::WebPkiOnly,
            additional_roots: Vec::new(),
        }
    }
}

impl TlsSettings {
    pub fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn with_trust_store_mode(mut self, mode: TrustStoreMode) -> Self {
        self.trust_store_mode = mode;
        self
    }

    pub fn with_additional_root(mut self, der: Vec<u8>) -> Self {
        self.additional_roots.push(der);
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.minimum_version > self.maximum_version {
            return Err(ClientError::new(
                ErrorKind::InvalidConfig,
                "net.tls.invalid_version_range",
                "minimum TLS version cannot be greater than maximum version",
            ));
        }

        if self.server_name.as_deref().is_some_and(str::is_empty) {
            return Err(ClientError::new(
                ErrorKind::InvalidConfig,
                "net.tls.server_name_empty",
                "TLS server name override must not be empty",
            ));
        }

        Ok(())
    }

    /// Name the peer certificate must be valid for.
    pub fn server_name_for<'a>(&'a self, host: &'a str) -> &'a str {
        self.server_name.as_deref().unwrap_or(host)
    }
}
