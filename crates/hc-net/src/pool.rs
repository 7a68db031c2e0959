//! Connection cache and request registry behind one lock.

use crate::address::CanonicalAddress;
use crate::cache::ConnectionCache;
use crate::connection::Connection;
use crate::http::RequestId;
use crate::registry::Registry;
use crate::registry::not_bound;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// Pool telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub addresses: usize,
    pub idle_connections: usize,
    pub outstanding: usize,
    pub bound_requests: usize,
}

#[derive(Debug)]
struct TableState {
    cache: ConnectionCache,
    registry: Registry,
    closed: bool,
}

/// Owns every connection the client knows about.
///
/// A connection is either idle in the cache or bound to one request in the
/// registry; moving it between the two happens under the same lock so a
/// finish never races a checkout for the same address.
#[derive(Debug)]
pub struct ConnectionTable {
    state: Mutex<TableState>,
}

impl ConnectionTable {
    pub fn new(max_conns_per_host: usize) -> Self {
        Self {
            state: Mutex::new(TableState {
                cache: ConnectionCache::new(max_conns_per_host),
                registry: Registry::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves a slot at `address`, handing back an idle connection if any.
    pub fn checkout(&self, address: &CanonicalAddress) -> ClientResult<Option<Connection>> {
        let mut state = self.lock();
        if state.closed {
            return Err(ClientError::new(
                ErrorKind::Closed,
                "net.pool.closed",
                "client has been closed",
            ));
        }

        let taken = state.cache.take(address)?;
        match &taken {
            Some(connection) => {
                tracing::debug!(address = %address, connection = connection.id(), "reusing cached connection");
            }
            None => tracing::debug!(address = %address, "no idle connection; dialing"),
        }
        Ok(taken)
    }

    /// Gives back a slot whose dial failed.
    pub fn abandon(&self, address: &CanonicalAddress) {
        if let Err(error) = self.lock().cache.release(address) {
            tracing::warn!(address = %address, error = %error, "abandoning unknown checkout");
        }
    }

    /// Binds `connection` to `request`.
    ///
    /// An id that is still bound (a clone of the request dispatched twice,
    /// or a request never finished) is refused with `InvalidRequest`; the
    /// checked-out connection goes back to the cache untouched.
    pub fn bind(&self, request: RequestId, connection: Connection) -> ClientResult<()> {
        let to_close = {
            let mut state = self.lock();
            if !state.registry.contains(request) {
                state.registry.bind(request, Arc::clone(&connection));
                tracing::debug!(request = %request, connection = connection.id(), "bound request");
                return Ok(());
            }
            give_back(&mut state, connection)?
        };

        if let Some(connection) = to_close {
            connection.close();
        }
        tracing::warn!(request = %request, "request is already bound; refusing dispatch");
        Err(ClientError::new(
            ErrorKind::InvalidRequest,
            "net.pool.already_bound",
            format!("{request} is already in flight or was never finished"),
        ))
    }

    pub fn lookup(&self, request: RequestId) -> ClientResult<Connection> {
        self.lock().registry.lookup(request)
    }

    /// Completes a request: the connection goes back to the cache, or is
    /// closed when it was marked `should_close` or the client is closed.
    pub fn finish(&self, request: RequestId) -> ClientResult<()> {
        let to_close = {
            let mut state = self.lock();
            let connection = state
                .registry
                .unbind(request)
                .ok_or_else(|| not_bound(request))?;
            give_back(&mut state, connection)?
        };

        if let Some(connection) = to_close {
            tracing::debug!(connection = connection.id(), "closing connection instead of caching it");
            connection.close();
        }

        tracing::debug!(request = %request, "finished request");
        Ok(())
    }

    /// Error path: `connection` is closed and never cached. The binding and
    /// the outstanding slot are dropped only while `request` is still bound
    /// to this very connection.
    pub fn fail(&self, request: RequestId, connection: &Connection) {
        let owned = {
            let mut state = self.lock();
            let owned = state.registry.is_bound_to(request, connection);
            if owned {
                state.registry.unbind(request);
                if let Err(error) = state.cache.release(connection.address()) {
                    tracing::warn!(address = %connection.address(), error = %error, "released unknown address");
                }
            }
            owned
        };

        connection.close();
        if !owned {
            tracing::debug!(request = %request, connection = connection.id(), "failed connection was no longer bound");
        }
    }

    /// Interrupts the I/O of `request` if it is still bound.
    pub fn cancel(&self, request: RequestId) -> bool {
        let connection = self.lock().registry.lookup(request);
        match connection {
            Ok(connection) => connection.cancel(),
            Err(_) => false,
        }
    }

    /// Closes all idle connections and refuses further checkouts. Bound
    /// connections are closed when their requests finish.
    pub fn close(&self) {
        let drained = {
            let mut state = self.lock();
            state.closed = true;
            state.cache.drain_idle()
        };

        for connection in drained {
            connection.close();
        }
    }

    pub fn contains_idle(&self, connection: &Connection) -> bool {
        self.lock().cache.contains_idle(connection)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        let cache = state.cache.stats();
        PoolStats {
            addresses: cache.addresses,
            idle_connections: cache.idle_connections,
            outstanding: cache.outstanding,
            bound_requests: state.registry.len(),
        }
    }
}

/// Returns a checked-out connection to the cache, or gives up its slot when
/// it must not be reused. Yields whatever the caller has to close.
fn give_back(state: &mut TableState, connection: Connection) -> ClientResult<Option<Connection>> {
    let address = connection.address().clone();
    if state.closed || connection.should_close() || connection.is_closed() {
        state.cache.release(&address)?;
        return Ok(Some(connection));
    }

    state.cache.put(&address, connection)
}
