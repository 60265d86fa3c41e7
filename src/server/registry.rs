//! Connection registry: the server's leaf lock in the lock order.
//!
//! Identifiers are internally assigned and never handed back to callers;
//! callers only ever see an opaque [`ConnectionHandle`], so the
//! underlying id can't be forged or introspected by calling code.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::protocol::ServerDiff;

type ConnectionId = u64;

/// Opaque reference to a registered connection. Holding one does not
/// expose the underlying id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle(ConnectionId);

/// Registry of live connections, mapping each to the channel the
/// broadcaster and request handler use to push [`ServerDiff`] frames.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerDiff>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new connection, returning its opaque handle.
    pub fn on_connect(&self, push: mpsc::UnboundedSender<ServerDiff>) -> ConnectionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(id, push);
        info!(connections = self.connections.len(), "connection registered");
        ConnectionHandle(id)
    }

    /// Remove a connection by its handle.
    pub fn on_disconnect(&self, handle: ConnectionHandle) {
        if self.connections.remove(&handle.0).is_some() {
            info!(connections = self.connections.len(), "connection removed");
        }
    }

    /// Number of currently registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Push `diff` to every registered connection. Failed sends (a
    /// disconnected client whose handle hasn't been reaped yet) are
    /// dropped silently: the broadcaster never retries, per §4.5 — the
    /// client will notice the resulting version gap on its next
    /// interaction and self-correct.
    pub fn broadcast(&self, diff: &ServerDiff) {
        self.connections.retain(|_, tx| tx.send(diff.clone()).is_ok());
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_disconnect_tracks_count() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = registry.on_connect(tx);
        assert_eq!(registry.len(), 1);
        registry.on_disconnect(handle);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_broadcast_reaches_all_connections() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.on_connect(tx1);
        registry.on_connect(tx2);

        registry.broadcast(&ServerDiff { version: 0, diff: vec![] });

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_drops_disconnected_receivers() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.on_connect(tx);
        drop(rx);

        registry.broadcast(&ServerDiff { version: 0, diff: vec![] });
        assert_eq!(registry.len(), 0);
    }
}
