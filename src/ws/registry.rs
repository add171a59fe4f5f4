//! Registry of open subscription connections.
//!
//! Every connection holds a [`ConnectionGuard`] for its lifetime. Disposing
//! the registry flips the drain flag, which every connection watches, and
//! then waits until the last guard is dropped.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared handle to the set of open subscription connections.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    active: Arc<watch::Sender<usize>>,
    draining: Arc<watch::Sender<bool>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Creates an empty registry that accepts connections.
    #[must_use]
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        let (draining, _) = watch::channel(false);
        Self {
            active: Arc::new(active),
            draining: Arc::new(draining),
        }
    }

    /// Registers a new connection.
    ///
    /// Returns `None` once [`dispose`](Self::dispose) has started.
    #[must_use]
    pub fn register(&self) -> Option<ConnectionGuard> {
        // Count first, then check: `dispose` flags before it reads the count,
        // so either it waits for this guard or this call sees the flag.
        self.active.send_modify(|n| *n += 1);
        let guard = ConnectionGuard {
            active: Arc::clone(&self.active),
        };
        if self.is_draining() {
            return None;
        }
        Some(guard)
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    /// Returns `true` once disposal has started.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        *self.draining.borrow()
    }

    /// Returns a receiver that flips to `true` when disposal starts.
    #[must_use]
    pub fn drain_signal(&self) -> watch::Receiver<bool> {
        self.draining.subscribe()
    }

    /// Closes every open connection and waits until all of them are gone.
    ///
    /// New connections are refused from this point on.
    pub async fn dispose(&self) {
        self.draining.send_replace(true);
        let open = self.active();
        tracing::info!(open, "disposing subscription connections");

        let mut active = self.active.subscribe();
        // The sender lives in `self`, so this only returns once the count hits zero.
        let _ = active.wait_for(|n| *n == 0).await;
        tracing::info!("subscription connections closed");
    }
}

/// Keeps a connection counted in its registry until dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}
