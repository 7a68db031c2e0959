//! Loopback HTTP/1.1 server shared by the integration tests.

#![allow(dead_code)]

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// Delay applied by the `/test` route.
pub const SLOW_ROUTE_DELAY: Duration = Duration::from_millis(200);

/// Unwraps a result or fails the test with the error's display form.
pub fn ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    }
}

/// Installs a `tracing` subscriber once; filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keep-alive HTTP/1.1 server on an ephemeral loopback port.
///
/// Routes:
/// - `/test` sleeps for `SLOW_ROUTE_DELAY`, then answers `Hello world`
/// - `/post` answers with the number of body bytes received
/// - `/close` answers and closes the connection
/// - `/redirect/N` redirects to `/redirect/N-1`; `/redirect/0` answers `done`
/// - `/plain` answers `plain` immediately
///
/// Absolute-form targets are routed by their path, and `CONNECT` is answered
/// with `200` before serving the tunnelled requests on the same stream.
pub struct TestServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    log: RequestLog,
}

/// Request lines seen by a server, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RequestLog {
    fn record(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_owned()),
            Err(poisoned) => poisoned.into_inner().push(line.to_owned()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TestServer {
    pub fn start() -> Self {
        let listener = ok(TcpListener::bind("127.0.0.1:0"));
        let addr = ok(listener.local_addr());
        let accepted = Arc::new(AtomicUsize::new(0));
        let log = RequestLog::default();

        let counter = Arc::clone(&accepted);
        let server_log = log.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let log = server_log.clone();
                thread::spawn(move || {
                    if stream.set_read_timeout(Some(Duration::from_secs(10))).is_ok() {
                        let _ = serve_stream(stream, &log);
                    }
                });
            }
        });

        Self { addr, accepted, log }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Request lines received so far, across all connections.
    pub fn request_lines(&self) -> Vec<String> {
        self.log.lines()
    }
}

struct Request {
    line: String,
    method: String,
    path: String,
    body_len: usize,
    close: bool,
}

/// Serves keep-alive HTTP/1.1 on an accepted stream until either side closes.
pub fn serve_stream<S: Read + Write>(stream: S, log: &RequestLog) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    while let Some(request) = read_request(&mut reader)? {
        log.record(&request.line);
        if request.method == "CONNECT" {
            let writer = reader.get_mut();
            writer.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")?;
            writer.flush()?;
            continue;
        }

        let close = respond(reader.get_mut(), &request)?;
        if close || request.close {
            break;
        }
    }

    Ok(())
}

fn read_request<S: Read>(reader: &mut BufReader<S>) -> std::io::Result<Option<Request>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let request_line = line.trim_end().to_owned();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("GET").to_owned();
    let path = origin_path(parts.next().unwrap_or("/")).to_owned();

    let mut content_length = 0;
    let mut close = false;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("connection") {
            close = value.eq_ignore_ascii_case("close");
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;

    Ok(Some(Request {
        line: request_line,
        method,
        path,
        body_len: content_length,
        close,
    }))
}

/// Path of an origin-form or absolute-form request target.
fn origin_path(target: &str) -> &str {
    let Some((_, rest)) = target.split_once("://") else {
        return target;
    };
    match rest.find('/') {
        Some(start) => &rest[start..],
        None => "/",
    }
}

/// Writes the response for `request`; returns whether the server closes.
fn respond<W: Write>(writer: &mut W, request: &Request) -> std::io::Result<bool> {
    let path = request.path.as_str();

    if path == "/test" {
        thread::sleep(SLOW_ROUTE_DELAY);
        write_response(writer, "200 OK", &[], "Hello world")?;
        return Ok(false);
    }
    if path == "/post" {
        write_response(writer, "200 OK", &[], &request.body_len.to_string())?;
        return Ok(false);
    }
    if path == "/close" {
        write_response(writer, "200 OK", &["Connection: close"], "bye")?;
        return Ok(true);
    }
    if path == "/plain" {
        write_response(writer, "200 OK", &[], "plain")?;
        return Ok(false);
    }
    if let Some(remaining) = path.strip_prefix("/redirect/") {
        let remaining: usize = remaining.parse().unwrap_or(0);
        if remaining == 0 {
            write_response(writer, "200 OK", &[], "done")?;
        } else {
            let location = format!("Location: /redirect/{}", remaining - 1);
            write_response(writer, "302 Found", &[location.as_str()], "")?;
        }
        return Ok(false);
    }

    write_response(writer, "404 Not Found", &[], "not found")?;
    Ok(false)
}

fn write_response<W: Write>(
    writer: &mut W,
    status: &str,
    headers: &[&str],
    body: &str,
) -> std::io::Result<()> {
    let mut response = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\n", body.len());
    for header in headers {
        response.push_str(header);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");
    response.push_str(body);

    writer.write_all(response.as_bytes())?;
    writer.flush()
}
