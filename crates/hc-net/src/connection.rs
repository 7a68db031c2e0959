//! Physical connections and deadline-bounded I/O over them.

use crate::address::CanonicalAddress;
use std::io;
use std::io::Read;
use std::io::Write;
use std::net::Shutdown;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Trait-object-safe stream used by the wire codec and the cache.
pub trait IoStream: Read + Write + Send {}
impl<T> IoStream for T where T: Read + Write + Send {}

pub type BoxedIoStream = Box<dyn IoStream>;

/// Shared handle to a cached connection, as returned by `Client::get_conn`.
pub type Connection = Arc<CachedConnection>;

/// A dialed connection plus the flags that decide whether it may be reused.
///
/// `stream` carries the protocol bytes (plain TCP or TLS). `control` is a
/// clone of the underlying socket used for deadlines and for interrupting
/// blocked I/O from another thread.
pub struct CachedConnection {
    id: u64,
    address: CanonicalAddress,
    secure: bool,
    peer_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    stream: Mutex<BoxedIoStream>,
    control: TcpStream,
    should_close: AtomicBool,
    cancelled: AtomicBool,
    closed: AtomicBool,
}

impl CachedConnection {
    pub fn new(
        address: CanonicalAddress,
        control: TcpStream,
        stream: BoxedIoStream,
        secure: bool,
    ) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            address,
            secure,
            peer_addr: control.peer_addr().ok(),
            local_addr: control.local_addr().ok(),
            stream: Mutex::new(stream),
            control,
            should_close: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &CanonicalAddress {
        &self.address
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Flags the connection as not reusable; it is closed on finish instead
    /// of returning to the cache.
    pub fn mark_should_close(&self) {
        self.should_close.store(true, Ordering::Release);
    }

    pub fn should_close(&self) -> bool {
        self.should_close.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Interrupts any blocked read or write. Only the first call has effect.
    pub(crate) fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.should_close.store(true, Ordering::Release);
        self.shutdown_socket();
        true
    }

    /// Shuts the socket down. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.should_close.store(true, Ordering::Release);
        self.shutdown_socket();
        tracing::debug!(address = %self.address, connection = self.id, "connection closed");
    }

    fn shutdown_socket(&self) {
        match self.control.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotConnected => {}
            Err(error) => {
                tracing::debug!(connection = self.id, error = %error, "socket shutdown failed");
            }
        }
    }

    /// Runs one request/response exchange with exclusive access to the stream.
    pub(crate) fn exchange<T>(
        &self,
        deadline: Option<Instant>,
        run: impl FnOnce(&mut DeadlineStream<'_>) -> T,
    ) -> T {
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guarded = DeadlineStream {
            stream: &mut *stream,
            control: &self.control,
            deadline,
        };
        run(&mut guarded)
    }
}

impl std::fmt::Debug for CachedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedConnection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("secure", &self.secure)
            .field("peer_addr", &self.peer_addr)
            .field("should_close", &self.should_close())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Stream view that re-arms socket timeouts against an absolute deadline
/// before every read and write.
pub struct DeadlineStream<'a> {
    stream: &'a mut BoxedIoStream,
    control: &'a TcpStream,
    deadline: Option<Instant>,
}

impl DeadlineStream<'_> {
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    fn arm(&self) -> io::Result<()> {
        let timeout = match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "connection deadline exceeded",
                    ));
                }
                Some(remaining.max(Duration::from_millis(1)))
            }
            None => None,
        };

        self.control.set_read_timeout(timeout)?;
        self.control.set_write_timeout(timeout)
    }
}

impl Read for DeadlineStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.arm()?;
        self.stream.read(buf)
    }
}

impl Write for DeadlineStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.arm()?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.arm()?;
        self.stream.flush()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::loopback_connection;
    use std::io::Read;
    use std::io::Write;
    use std::time::Duration;
    use std::time::Instant;

    #[test]
    fn exchange_reads_and_writes_through_stream() {
        let (connection, mut server) = loopback_connection("a.test");
        assert!(server.write_all(b"pong").is_ok());

        let result = connection.exchange(None, |stream| {
            stream.write_all(b"ping")?;
            let mut buf = [0_u8; 4];
            stream.read_exact(&mut buf)?;
            Ok::<_, std::io::Error>(buf)
        });
        assert!(matches!(result, Ok(buf) if &buf == b"pong"));

        let mut received = [0_u8; 4];
        assert!(server.read_exact(&mut received).is_ok());
        assert_eq!(&received, b"ping");
    }

    #[test]
    fn elapsed_deadline_times_out_reads() {
        let (connection, _server) = loopback_connection("a.test");
        let deadline = Instant::now() + Duration::from_millis(30);

        let started = Instant::now();
        let result = connection.exchange(Some(deadline), |stream| {
            let mut buf = [0_u8; 1];
            stream.read(&mut buf)
        });
        assert!(result.is_err());
        if let Err(error) = result {
            assert!(matches!(
                error.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ));
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn cancel_interrupts_blocked_read_once() {
        let (connection, _server) = loopback_connection("a.test");
        let canceller = connection.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            canceller.cancel()
        });

        let result = connection.exchange(None, |stream| {
            let mut buf = [0_u8; 1];
            stream.read(&mut buf)
        });
        // Shutdown surfaces as EOF or an error depending on platform.
        assert!(matches!(result, Ok(0) | Err(_)));
        assert!(matches!(handle.join(), Ok(true)));
        assert!(connection.is_cancelled());
        assert!(connection.should_close());
        assert!(!connection.cancel());
    }

    #[test]
    fn close_is_idempotent_and_marks_should_close() {
        let (connection, _server) = loopback_connection("a.test");
        connection.close();
        connection.close();
        assert!(connection.is_closed());
        assert!(connection.should_close());
    }
}
