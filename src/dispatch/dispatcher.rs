//! The dispatcher and its producer-side inbox.
//!
//! All handler execution is serialized onto exactly one thread per
//! process: the owner's main loop calls [`Dispatcher::tick`] once per
//! iteration, and only that call runs handlers. Producers - the link's
//! reader task, or local code posting follow-up work - enqueue through a
//! clonable [`Inbox`] from any thread.
//!
//! ```text
//! Reader task ─┐
//! Local post  ─┼─► Inbox (mpsc) ─► [owner thread: tick()] ─► handlers
//! Delayed work─┘
//! ```
//!
//! Commands are delivered FIFO in enqueue order; batch envelopes are
//! decomposed on enqueue so their sub-commands keep their relative order.
//! Queries carry a one-shot reply slot that `tick` resolves with the
//! handler's result (or `""` when unhandled).

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use super::table::HandlerTable;
use crate::codec::{decode_batch, Value, ValueType, ValueView};

/// A command waiting for the next tick.
struct QueuedCommand {
    command_id: u16,
    value: ValueView,
}

/// A query waiting for the next tick, with its reply slot.
struct QueuedQuery {
    command_id: u16,
    value: ValueView,
    reply: oneshot::Sender<String>,
}

/// Clonable producer handle feeding a [`Dispatcher`].
///
/// Safe to use from any thread; enqueueing never blocks and never locks
/// out a concurrently running `tick`.
#[derive(Clone)]
pub struct Inbox {
    command_tx: mpsc::UnboundedSender<QueuedCommand>,
    query_tx: mpsc::UnboundedSender<QueuedQuery>,
    command_count: u16,
}

impl Inbox {
    /// Number of dense command ids the owning dispatcher covers.
    ///
    /// Senders use this bound to reject out-of-range ids at encode time.
    #[inline]
    pub fn command_count(&self) -> u16 {
        self.command_count
    }

    /// Enqueue a received command for the next tick.
    pub(crate) fn push_command(&self, command_id: u16, value: ValueView) {
        if self
            .command_tx
            .send(QueuedCommand { command_id, value })
            .is_err()
        {
            tracing::debug!(command_id, "dispatcher gone, dropping command");
        }
    }

    /// Enqueue a received query; the returned receiver resolves with the
    /// handler's result once the owner thread ticks.
    pub(crate) fn push_query(
        &self,
        command_id: u16,
        value: ValueView,
    ) -> oneshot::Receiver<String> {
        let (reply, rx) = oneshot::channel();
        if self
            .query_tx
            .send(QueuedQuery {
                command_id,
                value,
                reply,
            })
            .is_err()
        {
            tracing::debug!(command_id, "dispatcher gone, dropping query");
        }
        rx
    }

    /// Decompose a batch envelope and enqueue its commands in order.
    ///
    /// A truncated envelope is dropped whole; an individual sub-frame
    /// with a bad tag or length is dropped alone, and the rest of the
    /// batch still goes through.
    pub(crate) fn push_batch(&self, payload: &[u8]) {
        let entries = match decode_batch(payload) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed batch envelope");
                return;
            }
        };
        for entry in entries {
            let Some(kind) = ValueType::from_u8(entry.value_type) else {
                tracing::warn!(
                    command_id = entry.command_id,
                    tag = entry.value_type,
                    "dropping batch entry with unknown value type"
                );
                continue;
            };
            match ValueView::new(kind, entry.value) {
                Ok(value) => self.push_command(entry.command_id, value),
                Err(e) => {
                    tracing::warn!(
                        command_id = entry.command_id,
                        error = %e,
                        "dropping malformed batch entry"
                    );
                }
            }
        }
    }

    /// Enqueue a local command for the next tick.
    ///
    /// This is how delayed or cross-thread work re-enters the owner
    /// thread: the closure that fires later posts here instead of
    /// touching engine state directly.
    ///
    /// # Panics
    ///
    /// Panics if `command_id >= command_count`; a locally produced id is
    /// under this build's control, so going out of range is a bug.
    pub fn post(&self, command_id: u16, value: &Value) {
        assert!(
            command_id < self.command_count,
            "command id {} out of range (count {})",
            command_id,
            self.command_count
        );
        self.push_command(command_id, ValueView::from_value(value));
    }

    /// Enqueue a raw frame body, validating tag and length first.
    ///
    /// Used by tests and by transports that hand over undecoded bytes.
    pub fn post_raw(&self, command_id: u16, value_type: u8, payload: Bytes) {
        let Some(kind) = ValueType::from_u8(value_type) else {
            tracing::warn!(command_id, tag = value_type, "dropping unknown value type");
            return;
        };
        match ValueView::new(kind, payload) {
            Ok(value) => self.push_command(command_id, value),
            Err(e) => tracing::warn!(command_id, error = %e, "dropping malformed payload"),
        }
    }
}

/// Owns the handler tables and the two FIFO queues; drained by `tick`.
///
/// Constructed explicitly by the application's composition root and
/// wired into a link - there is no process-wide instance, and tests
/// build their own.
pub struct Dispatcher {
    table: HandlerTable,
    command_rx: mpsc::UnboundedReceiver<QueuedCommand>,
    query_rx: mpsc::UnboundedReceiver<QueuedQuery>,
    inbox: Inbox,
}

impl Dispatcher {
    /// Create a dispatcher covering the dense id range
    /// `0..command_count`.
    pub fn new(command_count: u16) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (query_tx, query_rx) = mpsc::unbounded_channel();
        Self {
            table: HandlerTable::new(command_count),
            command_rx,
            query_rx,
            inbox: Inbox {
                command_tx,
                query_tx,
                command_count,
            },
        }
    }

    /// Number of dense command ids this dispatcher covers.
    #[inline]
    pub fn command_count(&self) -> u16 {
        self.table.command_count()
    }

    /// Register a command handler (additive multicast, registration
    /// order preserved).
    ///
    /// # Panics
    ///
    /// Panics if `command_id >= command_count`.
    pub fn on_command(&mut self, command_id: u16, handler: impl Fn(&ValueView) + Send + 'static) {
        self.table.add_command(command_id, handler);
    }

    /// Register a query handler (single slot, first registration wins).
    ///
    /// # Panics
    ///
    /// Panics if `command_id >= command_count`.
    pub fn on_query(
        &mut self,
        command_id: u16,
        handler: impl Fn(&ValueView) -> String + Send + 'static,
    ) {
        self.table.set_query(command_id, handler);
    }

    /// A clonable producer handle for wiring into a link or for local
    /// posting.
    pub fn inbox(&self) -> Inbox {
        self.inbox.clone()
    }

    /// Drain queued work, invoking handlers on the calling thread.
    ///
    /// Call once per main-loop iteration from the owner thread. Drains
    /// the command queue first, then the query queue, each bounded by its
    /// length at entry so a fast producer cannot pin the loop here.
    /// Nothing in this call panics into the caller: handler panics are
    /// caught per handler, and a dropped query sender just means the
    /// asker stopped waiting.
    pub fn tick(&mut self) {
        let pending = self.command_rx.len();
        for _ in 0..pending {
            let Ok(cmd) = self.command_rx.try_recv() else {
                break;
            };
            self.table.run_commands(cmd.command_id, &cmd.value);
        }

        let pending = self.query_rx.len();
        for _ in 0..pending {
            let Ok(query) = self.query_rx.try_recv() else {
                break;
            };
            let result = self.table.run_query(query.command_id, &query.value);
            let _ = query.reply.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_batch;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_commands_run_only_on_tick() {
        let mut dispatcher = Dispatcher::new(8);
        let hits = Arc::new(AtomicU32::new(0));

        let hits_clone = hits.clone();
        dispatcher.on_command(1, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.inbox().post(1, &Value::None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        dispatcher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_sends_drain_in_one_tick_in_order() {
        let mut dispatcher = Dispatcher::new(8);
        let log = Arc::new(Mutex::new(String::new()));

        let log_clone = log.clone();
        dispatcher.on_command(5, move |_| log_clone.lock().unwrap().push('X'));

        let inbox = dispatcher.inbox();
        inbox.post(5, &Value::None);
        inbox.post(5, &Value::None);
        inbox.post(5, &Value::None);

        dispatcher.tick();
        assert_eq!(*log.lock().unwrap(), "XXX");
    }

    #[test]
    fn test_fifo_across_distinct_commands() {
        let mut dispatcher = Dispatcher::new(8);
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in [1u16, 2] {
            let log_clone = log.clone();
            dispatcher.on_command(id, move |_| log_clone.lock().unwrap().push(id));
        }

        let inbox = dispatcher.inbox();
        inbox.post(1, &Value::None);
        inbox.post(2, &Value::None);
        inbox.post(1, &Value::None);

        dispatcher.tick();
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 1]);
    }

    #[test]
    fn test_query_resolved_by_tick() {
        let mut dispatcher = Dispatcher::new(16);
        dispatcher.on_query(10, |_| "42".to_string());

        let mut rx = dispatcher
            .inbox()
            .push_query(10, ValueView::from_value(&Value::None));

        // Not resolved before the tick.
        assert!(rx.try_recv().is_err());

        dispatcher.tick();
        assert_eq!(rx.try_recv().unwrap(), "42");
    }

    #[test]
    fn test_query_without_handler_resolves_empty() {
        let mut dispatcher = Dispatcher::new(16);
        let mut rx = dispatcher
            .inbox()
            .push_query(3, ValueView::from_value(&Value::None));

        dispatcher.tick();
        assert_eq!(rx.try_recv().unwrap(), "");
    }

    #[test]
    fn test_commands_drain_before_queries() {
        let mut dispatcher = Dispatcher::new(8);
        let log = Arc::new(Mutex::new(String::new()));

        let log_cmd = log.clone();
        dispatcher.on_command(1, move |_| log_cmd.lock().unwrap().push('c'));
        let log_query = log.clone();
        dispatcher.on_query(2, move |_| {
            log_query.lock().unwrap().push('q');
            String::new()
        });

        let inbox = dispatcher.inbox();
        let _rx = inbox.push_query(2, ValueView::from_value(&Value::None));
        inbox.post(1, &Value::None);

        dispatcher.tick();
        assert_eq!(*log.lock().unwrap(), "cq");
    }

    #[test]
    fn test_batch_unrolls_in_order() {
        let mut dispatcher = Dispatcher::new(8);
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in [1u16, 2, 3] {
            let log_clone = log.clone();
            dispatcher.on_command(id, move |v| {
                log_clone.lock().unwrap().push((id, v.as_int().unwrap()));
            });
        }

        let payload = encode_batch(&[
            (2, Value::Int(20)),
            (1, Value::Int(10)),
            (3, Value::Int(30)),
        ]);
        dispatcher.inbox().push_batch(&payload);

        dispatcher.tick();
        assert_eq!(*log.lock().unwrap(), vec![(2, 20), (1, 10), (3, 30)]);
    }

    #[test]
    fn test_malformed_batch_entry_skipped_rest_delivered() {
        let mut dispatcher = Dispatcher::new(8);
        let hits = Arc::new(AtomicU32::new(0));

        let hits_clone = hits.clone();
        dispatcher.on_command(1, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Entry with unknown tag, then a good one.
        let mut payload = bytes::BytesMut::new();
        use bytes::BufMut;
        payload.put_u16_le(1);
        payload.put_u8(99); // bad tag
        payload.put_u32_le(0);
        payload.extend_from_slice(&encode_batch(&[(1, Value::None)]));

        dispatcher.inbox().push_batch(&payload);
        dispatcher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_command_beyond_local_table_ignored() {
        let mut dispatcher = Dispatcher::new(4);
        dispatcher
            .inbox()
            .push_command(50, ValueView::from_value(&Value::None));
        dispatcher.tick(); // must not panic
    }

    #[test]
    fn test_post_raw_validates() {
        let mut dispatcher = Dispatcher::new(4);
        let hits = Arc::new(AtomicU32::new(0));

        let hits_clone = hits.clone();
        dispatcher.on_command(0, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        let inbox = dispatcher.inbox();
        inbox.post_raw(0, ValueType::Int.as_u8(), Value::Int(1).encode());
        // Wrong length for Int: dropped before the queue.
        inbox.post_raw(0, ValueType::Int.as_u8(), Bytes::from_static(&[1, 2]));

        dispatcher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tick_bounded_by_length_at_entry() {
        let mut dispatcher = Dispatcher::new(4);
        let inbox = dispatcher.inbox();
        let hits = Arc::new(AtomicU32::new(0));

        // The handler enqueues another command for the SAME id; a tick
        // must not chase it within the same drain.
        let hits_clone = hits.clone();
        let inbox_clone = inbox.clone();
        dispatcher.on_command(0, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            inbox_clone.post(0, &Value::None);
        });

        inbox.post(0, &Value::None);
        dispatcher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        dispatcher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
