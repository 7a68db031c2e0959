//! HTTP/1.1 request serialization and response parsing.

use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpStatusCode;
use crate::http::HttpVersion;
use crate::http::header_contains;
use brotli::Decompressor;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;

const MAX_RESPONSE_HEAD_BYTES: usize = 128 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 8 * 1024;
/// Upper bound on a response body, before and after content decoding.
pub const MAX_RESPONSE_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Status line and headers of a response, before the body is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status: HttpStatusCode,
    pub headers: Vec<Header>,
}

/// Maps an I/O failure, keeping deadline expiry distinguishable.
pub(crate) fn io_failure(code: &'static str, detail: &str, error: &io::Error) -> ClientError {
    let kind = match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::RequestTimeout,
        _ => ErrorKind::Io,
    };

    ClientError::new(kind, code, format!("{detail}: {error}"))
}

fn protocol_error(code: &'static str, message: impl Into<String>) -> ClientError {
    ClientError::new(ErrorKind::Protocol, code, message)
}

/// Serializes `request`. `absolute_form` sends the full URL as the request
/// target, as forwarding proxies expect.
pub fn write_request(
    stream: &mut dyn Write,
    request: &HttpRequest,
    absolute_form: bool,
    extra_headers: &[Header],
) -> ClientResult<()> {
    let target = if absolute_form {
        request.url.as_str().to_owned()
    } else {
        request.request_target()
    };

    let mut encoded = Vec::with_capacity(256 + request.body.len());
    encoded.extend_from_slice(request.method.as_str().as_bytes());
    encoded.push(b' ');
    encoded.extend_from_slice(target.as_bytes());
    encoded.push(b' ');
    encoded.extend_from_slice(request.version.as_str().as_bytes());
    encoded.extend_from_slice(b"\r\n");

    for header in request.headers.iter().chain(extra_headers) {
        encoded.extend_from_slice(header.name.as_bytes());
        encoded.extend_from_slice(b": ");
        encoded.extend_from_slice(header.value.as_bytes());
        encoded.extend_from_slice(b"\r\n");
    }
    encoded.extend_from_slice(b"\r\n");
    encoded.extend_from_slice(&request.body);

    stream.write_all(&encoded).map_err(|error| {
        io_failure(
            "net.http.write_failed",
            "failed to write HTTP request bytes",
            &error,
        )
    })?;
    stream.flush().map_err(|error| {
        io_failure(
            "net.http.flush_failed",
            "failed to flush HTTP request bytes",
            &error,
        )
    })?;

    Ok(())
}

/// Reads up to the end of the response head.
///
/// Returns the parsed head and any body bytes that arrived with it.
pub fn read_response_head(stream: &mut dyn Read) -> ClientResult<(ResponseHead, Vec<u8>)> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        let read = stream.read(&mut chunk).map_err(|error| {
            io_failure(
                "net.http.read_head_failed",
                "failed while reading HTTP response head",
                &error,
            )
        })?;

        if read == 0 {
            return Err(ClientError::new(
                ErrorKind::Io,
                "net.http.unexpected_eof",
                "unexpected EOF before response head completed",
            ));
        }

        buffer.extend_from_slice(&chunk[..read]);
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }

        if buffer.len() > MAX_RESPONSE_HEAD_BYTES {
            return Err(protocol_error(
                "net.http.head_too_large",
                format!("HTTP response head exceeds {MAX_RESPONSE_HEAD_BYTES} bytes"),
            ));
        }
    };

    let prefetched = buffer[header_end..].to_vec();
    let head = parse_head(&buffer[..header_end])?;
    Ok((head, prefetched))
}

fn parse_head(head_bytes: &[u8]) -> ClientResult<ResponseHead> {
    let head_text = std::str::from_utf8(head_bytes).map_err(|error| {
        protocol_error(
            "net.http.head_invalid_utf8",
            format!("HTTP response head is not valid UTF-8 text: {error}"),
        )
    })?;

    let mut lines = head_text.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| protocol_error("net.http.status_line_missing", "missing HTTP status line"))?;
    let (version, status) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            protocol_error(
                "net.http.header_invalid",
                format!("invalid HTTP header line `{line}`"),
            )
        })?;
        let header = Header::new(name.trim(), value.trim())
            .map_err(|error| error.with_kind(ErrorKind::Protocol))?;
        headers.push(header);
    }

    Ok(ResponseHead {
        version,
        status,
        headers,
    })
}

/// Consumes the response body according to its framing headers.
pub fn read_response_body(
    stream: &mut dyn Read,
    head: &ResponseHead,
    mut prefetched: Vec<u8>,
    method: HttpMethod,
    decode: bool,
) -> ClientResult<Vec<u8>> {
    if method == HttpMethod::Head || status_disallows_body(head.status.as_u16()) {
        return Ok(Vec::new());
    }

    let headers = &head.headers;
    let has_transfer_encoding = headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case("transfer-encoding"));
    let has_chunked_transfer = header_contains(headers, "transfer-encoding", "chunked");
    if has_transfer_encoding && !has_chunked_transfer {
        return Err(protocol_error(
            "net.http.transfer_encoding_unsupported",
            "only chunked transfer encoding is currently supported",
        ));
    }

    let body = if has_chunked_transfer {
        read_chunked_body(stream, prefetched)?
    } else if let Some(len) = parse_content_length(headers)? {
        ensure_body_fits(len)?;
        if prefetched.len() > len {
            prefetched.truncate(len);
        } else if prefetched.len() < len {
            let missing = len - prefetched.len();
            let read = Read::take(&mut *stream, missing as u64)
                .read_to_end(&mut prefetched)
                .map_err(|error| {
                    io_failure(
                        "net.http.read_body_failed",
                        "failed to read HTTP body bytes",
                        &error,
                    )
                })?;
            if read < missing {
                return Err(ClientError::new(
                    ErrorKind::Io,
                    "net.http.unexpected_eof",
                    format!("connection closed after {} of {len} body bytes", prefetched.len()),
                ));
            }
        }

        prefetched
    } else if header_contains(headers, "connection", "close") || head.version == HttpVersion::Http10
    {
        ensure_body_fits(prefetched.len())?;
        let allowance = MAX_RESPONSE_BODY_BYTES - prefetched.len();
        Read::take(&mut *stream, allowance as u64 + 1)
            .read_to_end(&mut prefetched)
            .map_err(|error| {
                io_failure(
                    "net.http.read_body_failed",
                    "failed while draining connection-close response body",
                    &error,
                )
            })?;
        ensure_body_fits(prefetched.len())?;
        prefetched
    } else {
        return Err(protocol_error(
            "net.http.body_length_unknown",
            "response body length is unknown without Content-Length or Connection: close",
        ));
    };

    if decode {
        decode_content_encoding(headers, &body)
    } else {
        Ok(body)
    }
}

struct PrefixedStreamReader<'a> {
    prefetched: Vec<u8>,
    offset: usize,
    stream: &'a mut dyn Read,
}

impl<'a> PrefixedStreamReader<'a> {
    fn new(stream: &'a mut dyn Read, prefetched: Vec<u8>) -> Self {
        Self {
            prefetched,
            offset: 0,
            stream,
        }
    }

    fn read_exact_into(&mut self, out: &mut [u8], detail: &str) -> ClientResult<()> {
        let available = self.prefetched.len().saturating_sub(self.offset);
        let prefix_take = available.min(out.len());

        if prefix_take > 0 {
            out[..prefix_take]
                .copy_from_slice(&self.prefetched[self.offset..self.offset + prefix_take]);
            self.offset += prefix_take;
        }

        if prefix_take < out.len() {
            self.stream
                .read_exact(&mut out[prefix_take..])
                .map_err(|error| io_failure("net.http.read_body_failed", detail, &error))?;
        }

        Ok(())
    }
}

fn read_chunked_body(stream: &mut dyn Read, prefetched: Vec<u8>) -> ClientResult<Vec<u8>> {
    let mut reader = PrefixedStreamReader::new(stream, prefetched);
    let mut decoded = Vec::new();

    loop {
        let size_line = read_crlf_line(&mut reader)?;
        if size_line.is_empty() {
            continue;
        }

        let size_token = size_line.split(';').next().unwrap_or_default().trim();
        let chunk_size = usize::from_str_radix(size_token, 16).map_err(|error| {
            protocol_error(
                "net.http.chunk_size_invalid",
                format!("invalid chunk size `{size_token}`: {error}"),
            )
        })?;

        if chunk_size == 0 {
            drain_chunk_trailers(&mut reader)?;
            break;
        }

        let start = decoded.len();
        let end = start.checked_add(chunk_size).unwrap_or(usize::MAX);
        ensure_body_fits(end)?;
        decoded.resize(end, 0);
        reader.read_exact_into(
            &mut decoded[start..],
            "failed while reading chunked HTTP body bytes",
        )?;

        let mut terminator = [0_u8; 2];
        reader.read_exact_into(&mut terminator, "failed while reading chunked body terminator")?;
        if terminator != *b"\r\n" {
            return Err(protocol_error(
                "net.http.chunk_terminator_invalid",
                "chunk data is missing trailing CRLF",
            ));
        }
    }

    Ok(decoded)
}

fn drain_chunk_trailers(reader: &mut PrefixedStreamReader<'_>) -> ClientResult<()> {
    loop {
        let line = read_crlf_line(reader)?;
        if line.is_empty() {
            break;
        }

        if line.split_once(':').is_none() {
            return Err(protocol_error(
                "net.http.chunk_trailer_invalid",
                format!("invalid chunk trailer line `{line}`"),
            ));
        }
    }

    Ok(())
}

fn read_crlf_line(reader: &mut PrefixedStreamReader<'_>) -> ClientResult<String> {
    let mut line = Vec::new();

    loop {
        let mut byte = [0_u8; 1];
        reader.read_exact_into(&mut byte, "failed while reading chunked transfer line")?;
        line.push(byte[0]);

        if line.len() > MAX_CHUNK_LINE_BYTES {
            return Err(protocol_error(
                "net.http.chunk_line_too_large",
                format!("chunk metadata line exceeds {MAX_CHUNK_LINE_BYTES} bytes"),
            ));
        }

        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            return String::from_utf8(line).map_err(|error| {
                protocol_error(
                    "net.http.chunk_line_invalid_utf8",
                    format!("chunk metadata line is not valid UTF-8: {error}"),
                )
            });
        }
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

fn parse_status_line(line: &str) -> ClientResult<(HttpVersion, HttpStatusCode)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    let code_text = parts.next().ok_or_else(|| {
        protocol_error(
            "net.http.status_line_invalid",
            format!("missing status code in status line `{line}`"),
        )
    })?;

    let version = match version {
        "HTTP/1.0" => HttpVersion::Http10,
        "HTTP/1.1" => HttpVersion::Http11,
        other => {
            return Err(protocol_error(
                "net.http.version_unsupported",
                format!("unsupported response version `{other}`"),
            ));
        }
    };

    let code_value = code_text.parse::<u16>().map_err(|error| {
        protocol_error(
            "net.http.status_line_invalid",
            format!("invalid status code `{code_text}`: {error}"),
        )
    })?;

    let code = HttpStatusCode::new(code_value)?;
    Ok((version, code))
}

fn parse_content_length(headers: &[Header]) -> ClientResult<Option<usize>> {
    let mut value: Option<usize> = None;
    for header in headers {
        if !header.name.eq_ignore_ascii_case("content-length") {
            continue;
        }

        let parsed = header.value.trim().parse::<usize>().map_err(|error| {
            protocol_error(
                "net.http.content_length_invalid",
                format!("invalid Content-Length `{}`: {error}", header.value),
            )
        })?;

        match value {
            Some(existing) if existing != parsed => {
                return Err(protocol_error(
                    "net.http.content_length_conflict",
                    "conflicting Content-Length headers in response",
                ));
            }
            _ => value = Some(parsed),
        }
    }

    Ok(value)
}

fn status_disallows_body(status_code: u16) -> bool {
    (100..200).contains(&status_code) || status_code == 204 || status_code == 304
}

fn decode_content_encoding(headers: &[Header], body: &[u8]) -> ClientResult<Vec<u8>> {
    let encodings = content_encodings(headers);
    if encodings.is_empty() {
        return Ok(body.to_vec());
    }

    let mut decoded = body.to_vec();
    for encoding in encodings.iter().rev() {
        decoded = match encoding.as_str() {
            "identity" => decoded,
            "gzip" | "x-gzip" => decode_with(GzDecoder::new(Cursor::new(&decoded)), "gzip")?,
            "deflate" => decode_deflate(&decoded)?,
            "br" => decode_with(Decompressor::new(Cursor::new(&decoded), 4096), "brotli")?,
            _ => {
                return Err(protocol_error(
                    "net.http.content_encoding_unsupported",
                    format!("unsupported content encoding `{encoding}`"),
                ));
            }
        };
    }

    Ok(decoded)
}

fn content_encodings(headers: &[Header]) -> Vec<String> {
    headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|header| header.value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

fn decode_with(decoder: impl Read, name: &str) -> ClientResult<Vec<u8>> {
    let mut decoded = Vec::new();
    decoder
        .take(MAX_RESPONSE_BODY_BYTES as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(|error| {
            protocol_error(
                "net.http.decode_failed",
                format!("{name} decode failed: {error}"),
            )
        })?;
    ensure_body_fits(decoded.len())?;
    Ok(decoded)
}

fn ensure_body_fits(len: usize) -> ClientResult<()> {
    if len > MAX_RESPONSE_BODY_BYTES {
        return Err(protocol_error(
            "net.http.body_too_large",
            format!("response body exceeds {MAX_RESPONSE_BODY_BYTES} bytes"),
        ));
    }

    Ok(())
}

fn decode_deflate(body: &[u8]) -> ClientResult<Vec<u8>> {
    if let Ok(decoded) = decode_with(ZlibDecoder::new(Cursor::new(body)), "deflate") {
        return Ok(decoded);
    }

    decode_with(DeflateDecoder::new(Cursor::new(body)), "deflate")
}

#[cfg(test)]
mod tests {
    use super::decode_content_encoding;
    use super::find_header_end;
    use super::parse_status_line;
    use super::read_chunked_body;
    use super::read_response_body;
    use super::read_response_head;
    use super::write_request;
    use crate::http::Header;
    use crate::http::HttpMethod;
    use crate::http::HttpRequest;
    use crate::url::RequestUrl;
    use brotli::CompressorWriter;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use hc_core::ErrorKind;
    use std::io;
    use std::io::Cursor;
    use std::io::Read;
    use std::io::Write;

    fn read_all(raw: &[u8], method: HttpMethod, decode: bool) -> (u16, Vec<u8>) {
        let mut stream = Cursor::new(raw.to_vec());
        let head = read_response_head(&mut stream);
        let (head, prefetched) = match head {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let body = read_response_body(&mut stream, &head, prefetched, method, decode);
        match body {
            Ok(body) => (head.status.as_u16(), body),
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn header_terminator_is_detected() {
        let data = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        assert_eq!(find_header_end(data), Some(data.len()));
    }

    #[test]
    fn status_line_parser_handles_both_versions() {
        assert!(parse_status_line("HTTP/1.1 200 OK").is_ok());
        assert!(parse_status_line("HTTP/1.0 404 Not Found").is_ok());
        assert!(parse_status_line("HTTP/2 200").is_err());
    }

    #[test]
    fn serializes_request_with_extra_headers() {
        let url = RequestUrl::parse("http://example.com/a?b=c");
        let request = url.and_then(|url| {
            HttpRequest::builder(HttpMethod::Post, url)
                .body(b"hi".to_vec())
                .build()
        });
        let request = match request {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let extra = match Header::new("Accept-Encoding", "gzip") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let mut out = Vec::new();
        assert!(write_request(&mut out, &request, false, &[extra]).is_ok());
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("POST /a?b=c HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.contains("Accept-Encoding: gzip\r\n"));
        assert!(text.ends_with("\r\n\r\nhi"));

        let mut forwarded = Vec::new();
        assert!(write_request(&mut forwarded, &request, true, &[]).is_ok());
        let text = String::from_utf8_lossy(&forwarded);
        assert!(text.starts_with("POST http://example.com/a?b=c HTTP/1.1\r\n"));
    }

    #[test]
    fn reads_content_length_body_across_reads() {
        let (status, body) = read_all(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello",
            HttpMethod::Get,
            false,
        );
        assert_eq!(status, 200);
        assert_eq!(body, b"hello");
    }

    #[test]
    fn head_response_has_no_body() {
        let (_, body) = read_all(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n",
            HttpMethod::Head,
            false,
        );
        assert!(body.is_empty());
    }

    #[test]
    fn connection_close_body_reads_to_eof() {
        let (_, body) = read_all(
            b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nuntil eof",
            HttpMethod::Get,
            false,
        );
        assert_eq!(body, b"until eof");
    }

    #[test]
    fn decodes_chunked_body() {
        let prefetched = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n".to_vec();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let decoded = read_chunked_body(&mut stream, prefetched);
        assert_eq!(decoded, Ok(b"Wikipedia".to_vec()));
    }

    #[test]
    fn chunked_decode_reports_invalid_size() {
        let prefetched = b"Z\r\nx\r\n0\r\n\r\n".to_vec();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let decoded = read_chunked_body(&mut stream, prefetched);
        assert!(decoded.is_err());
        if let Err(error) = decoded {
            assert_eq!(error.code, "net.http.chunk_size_invalid");
            assert_eq!(error.kind(), ErrorKind::Protocol);
        }
    }

    #[test]
    fn eof_before_head_is_an_io_error() {
        let mut stream = Cursor::new(b"HTTP/1.1 200 OK\r\n".to_vec());
        let head = read_response_head(&mut stream);
        assert!(head.is_err());
        if let Err(error) = head {
            assert_eq!(error.code, "net.http.unexpected_eof");
            assert_eq!(error.kind(), ErrorKind::Io);
        }
    }

    #[test]
    fn oversized_content_length_is_rejected_without_allocating() {
        let mut stream =
            Cursor::new(b"HTTP/1.1 200 OK\r\nContent-Length: 18446744073709551000\r\n\r\nxy".to_vec());
        let head = read_response_head(&mut stream);
        let (head, prefetched) = match head {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let body = read_response_body(&mut stream, &head, prefetched, HttpMethod::Get, false);
        assert!(matches!(
            body,
            Err(ref error) if error.kind() == ErrorKind::Protocol && error.code == "net.http.body_too_large"
        ));
    }

    #[test]
    fn short_content_length_body_is_an_eof_error() {
        let mut stream = Cursor::new(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort".to_vec());
        let head = read_response_head(&mut stream);
        let (head, prefetched) = match head {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let body = read_response_body(&mut stream, &head, prefetched, HttpMethod::Get, false);
        assert!(matches!(body, Err(ref error) if error.code == "net.http.unexpected_eof"));
    }

    #[test]
    fn oversized_chunk_size_is_a_protocol_error() {
        let prefetched = b"4\r\nWiki\r\nffffffffffffffff\r\nx\r\n0\r\n\r\n".to_vec();
        let mut stream = Cursor::new(Vec::<u8>::new());

        let decoded = read_chunked_body(&mut stream, prefetched);
        assert!(matches!(
            decoded,
            Err(ref error) if error.kind() == ErrorKind::Protocol && error.code == "net.http.body_too_large"
        ));
    }

    struct TimingOutReader;

    impl Read for TimingOutReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "deadline"))
        }
    }

    #[test]
    fn read_timeout_maps_to_request_timeout() {
        let head = read_response_head(&mut TimingOutReader);
        assert!(head.is_err());
        if let Err(error) = head {
            assert_eq!(error.kind(), ErrorKind::RequestTimeout);
        }
    }

    #[test]
    fn rejects_unsupported_transfer_encoding() {
        let mut stream = Cursor::new(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip\r\nConnection: close\r\n\r\nbody".to_vec(),
        );
        let head = read_response_head(&mut stream);
        let (head, prefetched) = match head {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let body = read_response_body(&mut stream, &head, prefetched, HttpMethod::Get, true);
        assert!(body.is_err());
        if let Err(error) = body {
            assert_eq!(error.code, "net.http.transfer_encoding_unsupported");
        }
    }

    #[test]
    fn decodes_gzip_only_when_requested() {
        let mut encoded = Vec::new();
        {
            let mut encoder = GzEncoder::new(&mut encoded, Compression::default());
            assert!(encoder.write_all(b"hello gzip").is_ok());
            assert!(encoder.finish().is_ok());
        }

        let mut raw = format!(
            "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            encoded.len()
        )
        .into_bytes();
        raw.extend_from_slice(&encoded);

        let (_, decoded) = read_all(&raw, HttpMethod::Get, true);
        assert_eq!(decoded, b"hello gzip");

        let (_, untouched) = read_all(&raw, HttpMethod::Get, false);
        assert_eq!(untouched, encoded);
    }

    #[test]
    fn decodes_brotli_content_encoding() {
        let mut encoded = Vec::new();
        {
            let mut writer = CompressorWriter::new(&mut encoded, 4096, 5, 22);
            assert!(writer.write_all(b"hello br").is_ok());
            assert!(writer.flush().is_ok());
        }

        let header = match Header::new("Content-Encoding", "br") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let decoded = decode_content_encoding(&[header], &encoded);
        assert_eq!(decoded, Ok(b"hello br".to_vec()));
    }
}
