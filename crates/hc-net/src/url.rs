//! Request URL parsing and validation.

use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use url::Url;

/// Supported request URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Validated absolute URL a request is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    parsed: Url,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl RequestUrl {
    pub fn parse(input: &str) -> ClientResult<Self> {
        let parsed = Url::parse(input).map_err(|error| {
            ClientError::new(
                ErrorKind::InvalidRequest,
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        Self::from_url(parsed)
    }

    fn from_url(mut parsed: Url) -> ClientResult<Self> {
        if parsed.cannot_be_a_base() {
            return Err(ClientError::new(
                ErrorKind::InvalidRequest,
                "net.url.invalid_base",
                "URL cannot be used as a request target",
            ));
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(ClientError::new(
                ErrorKind::InvalidRequest,
                "net.url.credentials_disallowed",
                "URL userinfo (`username:password@`) is not allowed",
            ));
        }

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(ClientError::new(
                    ErrorKind::InvalidRequest,
                    "net.url.scheme_unsupported",
                    format!("unsupported scheme `{other}`"),
                ));
            }
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| {
                ClientError::new(
                    ErrorKind::InvalidRequest,
                    "net.url.host_missing",
                    "URL must include a host",
                )
            })?
            .to_ascii_lowercase();

        let port = parsed.port().unwrap_or_else(|| scheme.default_port());

        // Fragments are client-side only and never sent on the wire.
        parsed.set_fragment(None);

        Ok(Self {
            parsed,
            scheme,
            host,
            port,
        })
    }

    /// Resolves a `Location` value against this URL.
    pub fn join(&self, location: &str) -> ClientResult<Self> {
        let joined = self.parsed.join(location).map_err(|error| {
            ClientError::new(
                ErrorKind::Protocol,
                "net.url.location_invalid",
                format!("invalid redirect location `{location}`: {error}"),
            )
        })?;

        Self::from_url(joined)
    }

    pub fn as_str(&self) -> &str {
        self.parsed.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host as written in the URL; IPv6 literals keep their brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host without IPv6 brackets, suitable for TLS server names.
    pub fn bare_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    /// `host[:port]` with the port only when it differs from the scheme default.
    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn path_and_query(&self) -> String {
        let path = if self.parsed.path().is_empty() {
            "/"
        } else {
            self.parsed.path()
        };

        match self.parsed.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }
}

impl std::fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
