//! Pending-query correlation.
//!
//! Any number of queries may be in flight from the same process at once,
//! and the peer resolves them in whatever order its tick produces
//! results, so responses cannot be matched positionally. Each outgoing
//! query takes a monotonically increasing correlation id; the response
//! echoes it back and fulfills exactly that future.
//!
//! A response whose id is unknown (a late reply after a timeout, or a
//! leftover from before a reconnect) is logged and discarded - it must
//! never resolve someone else's future or block forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Tracks outstanding queries by correlation id.
///
/// Cheap to share behind an `Arc`; the pending map is locked only for
/// short register/fulfill operations, never while awaiting.
pub struct QueryCorrelator {
    pending: Mutex<HashMap<u32, oneshot::Sender<String>>>,
    next_id: AtomicU32,
}

impl QueryCorrelator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            // Correlation id 0 marks plain commands on the wire.
            next_id: AtomicU32::new(1),
        }
    }

    /// Register a new outstanding query.
    ///
    /// Returns the correlation id to stamp on the outgoing frame and the
    /// receiver that will resolve with the peer's result.
    pub fn register(&self) -> (u32, oneshot::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("correlator lock poisoned")
            .insert(id, tx);
        (id, rx)
    }

    /// Resolve the pending query matching `correlation_id`.
    ///
    /// An unmatched id is discarded with a debug log.
    pub fn fulfill(&self, correlation_id: u32, result: String) {
        let sender = self
            .pending
            .lock()
            .expect("correlator lock poisoned")
            .remove(&correlation_id);
        match sender {
            Some(tx) => {
                // The asker may have stopped waiting (timeout); fine.
                let _ = tx.send(result);
            }
            None => {
                tracing::debug!(correlation_id, "discarding unmatched query response");
            }
        }
    }

    /// Drop a pending query without resolving it (timeout path).
    ///
    /// Returns whether the id was still outstanding.
    pub fn forget(&self, correlation_id: u32) -> bool {
        self.pending
            .lock()
            .expect("correlator lock poisoned")
            .remove(&correlation_id)
            .is_some()
    }

    /// Resolve every outstanding query with an empty result.
    ///
    /// Called at teardown so no future is left dangling past the life of
    /// the connection.
    pub fn abort_all(&self) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .expect("correlator lock poisoned")
            .drain()
            .collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "resolving pending queries empty");
        }
        for (_, tx) in drained {
            let _ = tx.send(String::new());
        }
    }

    /// Number of queries currently awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().expect("correlator lock poisoned").len()
    }
}

impl Default for QueryCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
