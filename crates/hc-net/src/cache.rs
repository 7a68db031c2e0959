//! Per-address idle connection lists with outstanding-connection accounting.

use crate::address::CanonicalAddress;
use crate::connection::Connection;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::collections::HashMap;
use std::collections::VecDeque;

/// Cache telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub addresses: usize,
    pub idle_connections: usize,
    pub outstanding: usize,
}

#[derive(Debug, Default)]
struct CacheEntry {
    /// Most recently returned first.
    idle: VecDeque<Connection>,
    /// Checked out and not yet returned or closed.
    outstanding: usize,
}

/// Idle connections keyed by canonical address.
///
/// `outstanding` rises on every checkout, whether the caller then reuses an
/// idle connection or dials a fresh one, and falls when the connection is
/// returned with `put` or given up with `release`.
#[derive(Debug)]
pub struct ConnectionCache {
    max_per_host: usize,
    entries: HashMap<CanonicalAddress, CacheEntry>,
}

impl ConnectionCache {
    pub fn new(max_per_host: usize) -> Self {
        Self {
            max_per_host,
            entries: HashMap::new(),
        }
    }

    pub fn max_per_host(&self) -> usize {
        self.max_per_host
    }

    /// Checks out a slot for `address`.
    ///
    /// Returns the most recently cached idle connection, or `None` when the
    /// caller must dial. Either way the slot counts as outstanding until
    /// `put` or `release`.
    pub fn take(&mut self, address: &CanonicalAddress) -> ClientResult<Option<Connection>> {
        let entry = self.entries.entry(address.clone()).or_default();
        if entry.outstanding >= self.max_per_host {
            let outstanding = entry.outstanding;
            if entry.idle.is_empty() && outstanding == 0 {
                self.entries.remove(address);
            }
            return Err(ClientError::new(
                ErrorKind::CapacityExceeded,
                "net.cache.capacity_exceeded",
                format!(
                    "`{address}` already has {outstanding} outstanding connections (max {})",
                    self.max_per_host
                ),
            ));
        }

        entry.outstanding += 1;
        while let Some(connection) = entry.idle.pop_front() {
            if !connection.is_closed() {
                return Ok(Some(connection));
            }
        }

        Ok(None)
    }

    /// Returns a checked-out connection to the front of its idle list.
    ///
    /// Returns the connection evicted from the back when the list is full;
    /// the caller closes it.
    pub fn put(
        &mut self,
        address: &CanonicalAddress,
        connection: Connection,
    ) -> ClientResult<Option<Connection>> {
        let max_idle = self.max_per_host;
        let entry = self.entry_mut(address)?;
        entry.outstanding = entry.outstanding.saturating_sub(1);
        entry.idle.push_front(connection);

        if entry.idle.len() > max_idle {
            return Ok(entry.idle.pop_back());
        }

        Ok(None)
    }

    /// Gives up a checked-out slot whose connection was closed or never dialed.
    pub fn release(&mut self, address: &CanonicalAddress) -> ClientResult<()> {
        let entry = self.entry_mut(address)?;
        entry.outstanding = entry.outstanding.saturating_sub(1);

        if entry.outstanding == 0 && entry.idle.is_empty() {
            self.entries.remove(address);
        }

        Ok(())
    }

    pub fn outstanding(&self, address: &CanonicalAddress) -> usize {
        self.entries
            .get(address)
            .map_or(0, |entry| entry.outstanding)
    }

    pub fn idle_count(&self, address: &CanonicalAddress) -> usize {
        self.entries.get(address).map_or(0, |entry| entry.idle.len())
    }

    pub fn contains_idle(&self, connection: &Connection) -> bool {
        self.entries.values().any(|entry| {
            entry
                .idle
                .iter()
                .any(|idle| idle.id() == connection.id())
        })
    }

    /// Removes every idle connection, keeping outstanding counts intact.
    pub fn drain_idle(&mut self) -> Vec<Connection> {
        let drained = self
            .entries
            .values_mut()
            .flat_map(|entry| entry.idle.drain(..))
            .collect();
        self.entries.retain(|_, entry| entry.outstanding > 0);
        drained
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            addresses: self.entries.len(),
            idle_connections: self.entries.values().map(|entry| entry.idle.len()).sum(),
            outstanding: self.entries.values().map(|entry| entry.outstanding).sum(),
        }
    }

    fn entry_mut(&mut self, address: &CanonicalAddress) -> ClientResult<&mut CacheEntry> {
        self.entries.get_mut(address).ok_or_else(|| {
            ClientError::new(
                ErrorKind::UnknownAddress,
                "net.cache.unknown_address",
                format!("`{address}` was never checked out from the connection cache"),
            )
        })
    }
}
