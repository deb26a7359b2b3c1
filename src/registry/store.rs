//! Client registry implementation
//!
//! The central set of connected listeners and the broadcast fan-out over it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::listener::{Listener, ListenerId};
use crate::stats::BroadcastStats;

/// Why a listener was pruned during fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    /// Receiver dropped (remote end gone)
    Closed,
    /// Buffer full, listener can't keep up with the live rate
    Lagging,
}

/// Registry of connected listeners
///
/// Thread-safe via `RwLock`. Fan-out only needs the read lock, so concurrent
/// broadcasts and lookups don't contend; the write lock is taken for
/// register/unregister and to prune dead entries after a send pass.
pub struct ClientRegistry {
    /// Map of listener id to its output channel
    listeners: RwLock<HashMap<ListenerId, mpsc::Sender<Bytes>>>,

    next_id: AtomicU64,

    config: RegistryConfig,

    stats: Arc<BroadcastStats>,
}

impl ClientRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_stats(config, Arc::new(BroadcastStats::new()))
    }

    /// Create a registry that records into shared stats
    ///
    /// A zero `listener_buffer` is raised to 1.
    pub fn with_stats(mut config: RegistryConfig, stats: Arc<BroadcastStats>) -> Self {
        config.listener_buffer = config.listener_buffer.max(1);

        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            stats,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Shared statistics
    pub fn stats(&self) -> &Arc<BroadcastStats> {
        &self.stats
    }

    /// Register a new listener
    ///
    /// The listener only sees chunks broadcast after this call returns.
    pub async fn register(&self) -> Listener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.listener_buffer);

        let mut listeners = self.listeners.write().await;
        listeners.insert(id, tx);
        self.stats.record_join();

        tracing::info!(listener = id, listeners = listeners.len(), "Listener registered");

        Listener::new(id, rx)
    }

    /// Remove a listener
    ///
    /// Idempotent: removing an unknown id is a no-op. Returns whether an entry
    /// was removed.
    pub async fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        let removed = listeners.remove(&id).is_some();

        if removed {
            tracing::info!(listener = id, listeners = listeners.len(), "Listener unregistered");
        }

        removed
    }

    /// Copy a chunk to every registered listener
    ///
    /// Iterates a read-locked view of the map, so a concurrent register or
    /// unregister either fully happens before or fully after this pass.
    /// Listeners found closed or lagging are removed before returning.
    ///
    /// Returns the number of listeners the chunk was delivered to.
    pub async fn broadcast(&self, chunk: Bytes) -> usize {
        let len = chunk.len();
        let mut dead: Vec<(ListenerId, DropReason)> = Vec::new();

        let delivered = {
            let listeners = self.listeners.read().await;
            let mut delivered = 0;

            for (id, tx) in listeners.iter() {
                match tx.try_send(chunk.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Closed(_)) => dead.push((*id, DropReason::Closed)),
                    Err(TrySendError::Full(_)) => dead.push((*id, DropReason::Lagging)),
                }
            }

            delivered
        };

        self.stats.record_chunk(len);

        if !dead.is_empty() {
            self.prune(dead).await;
        }

        delivered
    }

    async fn prune(&self, dead: Vec<(ListenerId, DropReason)>) {
        let mut listeners = self.listeners.write().await;

        for (id, reason) in dead {
            // Dropping the sender ends the listener's stream once drained
            if listeners.remove(&id).is_some() {
                self.stats.record_drop();
                match reason {
                    DropReason::Closed => {
                        tracing::debug!(listener = id, "Listener closed, removed");
                    }
                    DropReason::Lagging => {
                        tracing::warn!(
                            listener = id,
                            buffer = self.config.listener_buffer,
                            "Listener too slow, disconnected"
                        );
                    }
                }
            }
        }
    }

    /// Number of registered listeners
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Check whether a listener is registered
    pub async fn contains(&self, id: ListenerId) -> bool {
        self.listeners.read().await.contains_key(&id)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
