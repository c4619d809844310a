//! Live WebSocket connection tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::observability::metrics;

#[derive(Debug, Clone)]
struct Connection {
    /// Distinguishes a reconnect under the same id from the socket it replaced.
    generation: u64,
    connected_at: u64,
}

#[derive(Debug, Default)]
struct Inner {
    connections: DashMap<String, Connection>,
    generations: AtomicU64,
}

/// Shared registry of open sockets keyed by client-chosen connection id.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a socket until the returned guard is dropped.
    ///
    /// Registering an id that is already live replaces the older entry.
    pub fn register(&self, connection_id: &str) -> ConnectionGuard {
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let connected_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let replaced = self
            .inner
            .connections
            .insert(
                connection_id.to_string(),
                Connection {
                    generation,
                    connected_at,
                },
            )
            .is_some();
        if replaced {
            tracing::warn!(connection_id = %connection_id, "Connection id reused, replacing previous socket");
        }

        let active = self.len();
        metrics::set_ws_connections(active);
        tracing::info!(connection_id = %connection_id, active, "WebSocket connected");

        ConnectionGuard {
            manager: self.clone(),
            connection_id: connection_id.to_string(),
            generation,
        }
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.inner.connections.contains_key(connection_id)
    }

    /// Unix seconds at which `connection_id` connected.
    pub fn connected_at(&self, connection_id: &str) -> Option<u64> {
        self.inner
            .connections
            .get(connection_id)
            .map(|c| c.connected_at)
    }

    pub fn len(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.connections.is_empty()
    }

    fn release(&self, connection_id: &str, generation: u64) {
        let removed = self
            .inner
            .connections
            .remove_if(connection_id, |_, c| c.generation == generation)
            .is_some();
        if removed {
            let active = self.len();
            metrics::set_ws_connections(active);
            tracing::info!(connection_id = %connection_id, active, "WebSocket disconnected");
        }
    }
}

/// Removes its connection from the manager when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    manager: ConnectionManager,
    connection_id: String,
    generation: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.release(&self.connection_id, self.generation);
    }
}
