//! HTTP request/response value types.

use crate::url::RequestUrl;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one logical request. Redirect hops share their origin's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Supported outbound HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

/// Single HTTP header with validated wire-safe name/value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> ClientResult<Self> {
        if !is_valid_header_name(name) {
            return Err(ClientError::new(
                ErrorKind::InvalidRequest,
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(ClientError::new(
                ErrorKind::InvalidRequest,
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    id: RequestId,
    pub method: HttpMethod,
    pub url: RequestUrl,
    pub version: HttpVersion,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn builder(method: HttpMethod, url: RequestUrl) -> HttpRequestBuilder {
        HttpRequestBuilder {
            id: None,
            method,
            url,
            version: HttpVersion::Http11,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(raw_url: &str) -> ClientResult<Self> {
        Self::builder(HttpMethod::Get, RequestUrl::parse(raw_url)?).build()
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn request_target(&self) -> String {
        self.url.path_and_query()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether the caller asked for the connection to be closed afterwards.
    pub fn wants_close(&self) -> bool {
        header_contains(&self.headers, "connection", "close")
    }

    /// Builds the next hop of a redirect chain under the same request id.
    ///
    /// `Host` and body framing headers are regenerated for the new target.
    pub fn redirect_to(
        &self,
        method: HttpMethod,
        url: RequestUrl,
        body: Vec<u8>,
    ) -> ClientResult<Self> {
        let mut builder = Self::builder(method, url);
        builder.id = Some(self.id);
        builder.version = self.version;

        for header in &self.headers {
            let name = header.name.as_str();
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            if body.is_empty() && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            builder.headers.push(header.clone());
        }

        builder.body(body).build()
    }
}

/// Builder for `HttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestBuilder {
    id: Option<RequestId>,
    method: HttpMethod,
    url: RequestUrl,
    version: HttpVersion,
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl HttpRequestBuilder {
    pub fn version(mut self, version: HttpVersion) -> Self {
        self.version = version;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> ClientResult<Self> {
        self.headers.push(Header::new(name, value)?);
        Ok(self)
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(mut self) -> ClientResult<HttpRequest> {
        if matches!(self.method, HttpMethod::Get | HttpMethod::Head) && !self.body.is_empty() {
            return Err(ClientError::new(
                ErrorKind::InvalidRequest,
                "net.http.body_disallowed",
                format!("{} requests must not include a body", self.method.as_str()),
            ));
        }

        ensure_singleton_header(&self.headers, "host")?;
        ensure_singleton_header(&self.headers, "content-length")?;

        if !has_header(&self.headers, "host") {
            let host = self.url.authority();
            self.headers.push(Header::new("Host", &host)?);
        }

        let needs_length = !self.body.is_empty()
            || matches!(
                self.method,
                HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch
            );
        if needs_length && !has_header(&self.headers, "content-length") {
            let len = self.body.len().to_string();
            self.headers.push(Header::new("Content-Length", &len)?);
        }

        Ok(HttpRequest {
            id: self.id.unwrap_or_else(RequestId::next),
            method: self.method,
            url: self.url,
            version: self.version,
            headers: self.headers,
            body: self.body,
        })
    }
}

/// HTTP status code wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub fn new(code: u16) -> ClientResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(ClientError::new(
            ErrorKind::Protocol,
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..=299).contains(&self.0)
    }

    pub fn is_redirect(self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307 | 308)
    }
}

/// Incoming HTTP response together with the request hop that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: HttpVersion,
    pub status: HttpStatusCode,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
    pub request: HttpRequest,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Whether the connection this response arrived on may serve another request.
    pub fn is_keep_alive(&self) -> bool {
        if self.request.wants_close() || header_contains(&self.headers, "connection", "close") {
            return false;
        }

        match self.version {
            HttpVersion::Http10 => header_contains(&self.headers, "connection", "keep-alive"),
            HttpVersion::Http11 => true,
        }
    }
}

pub(crate) fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

pub(crate) fn header_contains(headers: &[Header], name: &str, value: &str) -> bool {
    headers.iter().any(|header| {
        header.name.eq_ignore_ascii_case(name)
            && header
                .value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case(value))
    })
}

pub(crate) fn has_header(headers: &[Header], name: &str) -> bool {
    headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case(name))
}

fn ensure_singleton_header(headers: &[Header], name: &str) -> ClientResult<()> {
    let count = headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case(name))
        .count();

    if count <= 1 {
        return Ok(());
    }

    Err(ClientError::new(
        ErrorKind::InvalidRequest,
        "net.http.duplicate_header",
        format!("header `{name}` must appear at most once"),
    ))
}

fn is_valid_header_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    name.bytes().all(is_token_char)
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
