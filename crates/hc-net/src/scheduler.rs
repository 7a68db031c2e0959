//! Background cancellation of requests whose whole-request deadline elapsed.

use crate::http::RequestId;
use crate::pqueue::DeadlineHandle;
use crate::pqueue::DeadlineQueue;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

/// Wake interval of the worker thread.
pub const DEFAULT_TICK: Duration = Duration::from_millis(25);

/// Cancellation primitive invoked for every expired request.
pub type CancelFn = Arc<dyn Fn(RequestId) -> bool + Send + Sync>;

struct Worker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct WorkerSlot {
    worker: Option<Worker>,
    stopped: bool,
}

/// Deadline queue serviced by one lazily started ticker thread.
pub struct CancellationScheduler {
    queue: Arc<Mutex<DeadlineQueue>>,
    tick: Duration,
    cancel: CancelFn,
    slot: Mutex<WorkerSlot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CancellationScheduler {
    pub fn new(tick: Duration, cancel: CancelFn) -> Self {
        Self {
            queue: Arc::new(Mutex::new(DeadlineQueue::with_capacity(16))),
            tick,
            cancel,
            slot: Mutex::new(WorkerSlot::default()),
        }
    }

    /// Queues `request` for cancellation at `deadline`, starting the worker
    /// on first use.
    pub fn schedule(&self, request: RequestId, deadline: Instant) -> ClientResult<DeadlineHandle> {
        self.ensure_started()?;
        Ok(lock(&self.queue).push(request, deadline))
    }

    /// Drops a pending deadline. Returns `false` if it already fired or was
    /// removed.
    pub fn unschedule(&self, handle: DeadlineHandle) -> bool {
        lock(&self.queue).remove(handle).is_some()
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.slot).worker.is_some()
    }

    fn ensure_started(&self) -> ClientResult<()> {
        let mut slot = lock(&self.slot);
        if slot.stopped {
            return Err(ClientError::new(
                ErrorKind::Closed,
                "net.scheduler.stopped",
                "cancellation scheduler has been stopped",
            ));
        }
        if slot.worker.is_some() {
            return Ok(());
        }

        let (stop, stop_rx) = mpsc::channel();
        let queue = Arc::clone(&self.queue);
        let cancel = Arc::clone(&self.cancel);
        let tick = self.tick;
        let handle = std::thread::Builder::new()
            .name("hc-cancel".to_owned())
            .spawn(move || run(&queue, tick, &cancel, &stop_rx))
            .map_err(|error| {
                ClientError::new(
                    ErrorKind::Io,
                    "net.scheduler.spawn_failed",
                    format!("failed to start cancellation worker: {error}"),
                )
            })?;

        tracing::debug!(tick = ?tick, "cancellation worker started");
        slot.worker = Some(Worker { stop, handle });
        Ok(())
    }

    /// Stops the worker and waits for it to exit. No cancellation fires
    /// after this returns. Later calls are no-ops.
    pub fn stop(&self) {
        let worker = {
            let mut slot = lock(&self.slot);
            slot.stopped = true;
            slot.worker.take()
        };

        let Some(worker) = worker else {
            return;
        };

        // A send error means the worker already exited.
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            tracing::warn!("cancellation worker panicked");
        }
        tracing::debug!("cancellation worker stopped");
    }
}

impl Drop for CancellationScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    queue: &Mutex<DeadlineQueue>,
    tick: Duration,
    cancel: &CancelFn,
    stop: &mpsc::Receiver<()>,
) {
    loop {
        match stop.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        loop {
            let expired = lock(queue).peek_and_shift(now);
            let Some(item) = expired else {
                break;
            };

            if cancel(item.request) {
                tracing::warn!(request = %item.request, "request deadline elapsed; cancelled");
            }
        }
    }
}
