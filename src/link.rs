//! Link builder and runtime loop.
//!
//! A [`Link`] is one end of the duplex channel between the engine and
//! its GUI. The [`LinkBuilder`] wires a dispatcher inbox to a transport
//! role:
//!
//! 1. `host()` - create the channel and wait for the peer to attach
//! 2. `connect()` - attach to a channel the peer created
//! 3. `over(stream)` - run on any duplex stream (in-memory tests)
//!
//! Once up, the link owns two background tasks: a reader that decodes
//! frames and routes them (responses to the correlator, queries and
//! commands to the inbox), and a writer that flushes outgoing frames.
//! Neither task ever runs an application handler - that stays on the
//! owner thread, inside `Dispatcher::tick`.
//!
//! Failure never crosses into caller code: `send` drops silently on a
//! dead channel, `query` always resolves (empty on failure, timeout, or
//! shutdown), and `close` is idempotent.
//!
//! # Example
//!
//! ```ignore
//! use scenelink::{Dispatcher, Link};
//! use scenelink::codec::Value;
//! use scenelink::transport::Channel;
//!
//! let mut dispatcher = Dispatcher::new(32);
//! dispatcher.on_command(4, |v| println!("preset -> {:?}", v.as_str()));
//!
//! let channel = Channel::unique("scenelink");
//! let link = Link::builder(channel, dispatcher.inbox()).host().await?;
//!
//! loop {
//!     dispatcher.tick(); // owner thread, once per frame
//!     # break;
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::watch;

use crate::codec::{CompositeBuffer, Value, ValueType};
use crate::config::LinkConfig;
use crate::correlate::QueryCorrelator;
use crate::dispatch::Inbox;
use crate::error::Result;
use crate::protocol::{
    flags, Frame, FrameBuffer, Header, BATCH_COMMAND_ID, DEFAULT_MAX_PAYLOAD_SIZE,
    GOODBYE_COMMAND_ID,
};
use crate::transport::{connect_with_retry, Channel, PipeListener};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Default deadline for `connect()` to find the peer's channel.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read buffer size for the reader task.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for configuring and starting a [`Link`].
pub struct LinkBuilder {
    channel: Channel,
    inbox: Inbox,
    query_timeout: Option<Duration>,
    connect_timeout: Duration,
    max_payload: u32,
    read_buffer: usize,
}

impl LinkBuilder {
    /// Create a builder for the given channel, feeding the given inbox.
    pub fn new(channel: Channel, inbox: Inbox) -> Self {
        Self {
            channel,
            inbox,
            query_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_payload: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Bound the latency of `query`; expiry resolves to `""`.
    ///
    /// Without this there is no built-in query timeout - callers that
    /// need one either set it here or wrap the future themselves.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// How long `connect()` keeps retrying before giving up.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Maximum accepted payload size for incoming frames.
    pub fn max_payload(mut self, bytes: u32) -> Self {
        self.max_payload = bytes;
        self
    }

    /// Read buffer size for the reader task.
    pub fn read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer = bytes;
        self
    }

    /// Apply the tunable settings from a [`LinkConfig`].
    ///
    /// The channel name is not taken from the config here; resolve it
    /// with [`LinkConfig::channel`] when constructing the builder.
    pub fn config(mut self, config: &LinkConfig) -> Self {
        self.query_timeout = config.query_timeout_ms.map(Duration::from_millis);
        self.connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        self.max_payload = config.max_payload_bytes;
        self.read_buffer = config.read_buffer_bytes;
        self
    }

    /// Create the channel and wait for the peer to attach.
    pub async fn host(self) -> Result<Link> {
        let listener = PipeListener::bind(&self.channel.endpoint()).await?;
        tracing::debug!(channel = self.channel.name(), "hosting link channel");
        let stream = listener.accept().await?;
        let (reader, writer) = stream.into_split();
        Ok(self.spawn_parts(reader, writer))
    }

    /// Attach to a channel the peer created, retrying until the connect
    /// timeout elapses.
    pub async fn connect(self) -> Result<Link> {
        let stream = connect_with_retry(&self.channel.endpoint(), self.connect_timeout).await?;
        tracing::debug!(channel = self.channel.name(), "attached to link channel");
        let (reader, writer) = stream.into_split();
        Ok(self.spawn_parts(reader, writer))
    }

    /// Run the link over an already-established duplex stream.
    pub fn over<S>(self, stream: S) -> Link
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        self.spawn_parts(reader, writer)
    }

    /// Spawn the reader/writer tasks and assemble the link.
    fn spawn_parts<R, W>(self, reader: R, write_half: W) -> Link
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer, _writer_task) = spawn_writer_task(write_half);
        let correlator = Arc::new(QueryCorrelator::new());
        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reader_inbox = self.inbox.clone();
        let reader_correlator = correlator.clone();
        let reader_writer = writer.clone();
        let reader_closed = closed.clone();
        let max_payload = self.max_payload;
        let read_buffer = self.read_buffer;

        tokio::spawn(async move {
            read_loop(
                reader,
                reader_inbox,
                &reader_correlator,
                reader_writer,
                max_payload,
                read_buffer,
            )
            .await;
            // Whatever ended the loop, leave nothing dangling behind it.
            reader_closed.store(true, Ordering::Release);
            reader_correlator.abort_all();
            let _ = shutdown_tx.send(true);
        });

        Link {
            writer,
            correlator,
            command_count: self.inbox.command_count(),
            query_timeout: self.query_timeout,
            composite: Mutex::new(None),
            closed,
            shutdown_rx,
        }
    }
}

/// One end of a running engine-GUI link.
pub struct Link {
    writer: WriterHandle,
    correlator: Arc<QueryCorrelator>,
    command_count: u16,
    query_timeout: Option<Duration>,
    composite: Mutex<Option<CompositeBuffer>>,
    closed: Arc<AtomicBool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Link {
    /// Create a link builder.
    pub fn builder(channel: Channel, inbox: Inbox) -> LinkBuilder {
        LinkBuilder::new(channel, inbox)
    }

    /// Send a fire-and-forget command.
    ///
    /// Non-blocking; a dead or closed channel drops the frame with a
    /// debug log. While composite mode is active the command is buffered
    /// instead, with the latest value per id winning at flush.
    ///
    /// # Panics
    ///
    /// Panics if `command_id` is outside the dispatcher's id range - the
    /// two binaries disagree about the protocol, which must fail loudly
    /// rather than corrupt the peer's dispatch.
    pub fn send(&self, command_id: u16, value: &Value) {
        self.check_command_id(command_id);

        {
            let mut composite = self.composite.lock().expect("composite lock poisoned");
            if let Some(buffer) = composite.as_mut() {
                buffer.push(command_id, value.clone());
                return;
            }
        }

        self.send_plain(command_id, value);
    }

    /// Send a command flagged as this side's final message, then treat
    /// the link as closed. Pending queries resolve empty.
    pub fn send_last(&self, command_id: u16, value: &Value) {
        self.check_command_id(command_id);
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(command_id, "link already closed, dropping final command");
            return;
        }
        let payload = value.encode();
        let header = Header::new(
            command_id,
            value.kind().as_u8(),
            flags::IS_LAST,
            0,
            payload.len() as u32,
        );
        self.writer.send(OutboundFrame::new(&header, payload));
        self.correlator.abort_all();
    }

    /// Issue a query and await its string result.
    ///
    /// Suspends only at the `.await` point; the result arrives once the
    /// peer's owner thread has ticked. Always resolves: transport
    /// failure, timeout, and shutdown all yield `""` instead of an
    /// error or a forever-pending future.
    ///
    /// # Panics
    ///
    /// Panics if `command_id` is outside the dispatcher's id range.
    pub async fn query(&self, command_id: u16, value: &Value) -> String {
        self.check_command_id(command_id);

        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(command_id, "link closed, query resolves empty");
            return String::new();
        }

        let (correlation_id, rx) = self.correlator.register();
        let payload = value.encode();
        let header = Header::new(
            command_id,
            value.kind().as_u8(),
            flags::IS_QUERY,
            correlation_id,
            payload.len() as u32,
        );

        if !self.writer.send(OutboundFrame::new(&header, payload)) {
            self.correlator.forget(correlation_id);
            return String::new();
        }

        match self.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(result) => result.unwrap_or_default(),
                Err(_) => {
                    self.correlator.forget(correlation_id);
                    tracing::warn!(command_id, "query timed out, resolving empty");
                    String::new()
                }
            },
            None => rx.await.unwrap_or_default(),
        }
    }

    /// Enter composite mode: subsequent `send` calls are buffered and
    /// de-duplicated by command id until [`end_composite`].
    ///
    /// Buffering replaces earlier values for the same id, so composite
    /// mode is only for idempotent "setter" commands. Calling this while
    /// already composing keeps the existing buffer.
    ///
    /// [`end_composite`]: Link::end_composite
    pub fn begin_composite(&self) {
        let mut composite = self.composite.lock().expect("composite lock poisoned");
        if composite.is_some() {
            tracing::warn!("composite already active, keeping current buffer");
            return;
        }
        *composite = Some(CompositeBuffer::new());
    }

    /// Flush the composite buffer as one batch frame and leave composite
    /// mode. An empty buffer sends nothing; without a matching
    /// [`begin_composite`] this is a no-op.
    ///
    /// [`begin_composite`]: Link::begin_composite
    pub fn end_composite(&self) {
        let buffer = self
            .composite
            .lock()
            .expect("composite lock poisoned")
            .take();
        let Some(buffer) = buffer else {
            tracing::debug!("end_composite without begin_composite");
            return;
        };
        if buffer.is_empty() {
            return;
        }
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("link closed, dropping composite flush");
            return;
        }

        let payload = buffer.encode();
        let header = Header::new(
            BATCH_COMMAND_ID,
            ValueType::Bytes.as_u8(),
            0,
            0,
            payload.len() as u32,
        );
        self.writer.send(OutboundFrame::new(&header, payload));
    }

    /// Whether distinct commands are currently being buffered, and how
    /// many.
    pub fn composite_len(&self) -> Option<usize> {
        self.composite
            .lock()
            .expect("composite lock poisoned")
            .as_ref()
            .map(CompositeBuffer::len)
    }

    /// Announce shutdown to the peer and stop sending.
    ///
    /// Idempotent and safe to call at any point, including when the peer
    /// already vanished. Emits a bare goodbye frame flagged as the final
    /// message so the peer can stop waiting without a timeout, and
    /// resolves any still-pending queries with `""`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let header = Header::new(
            GOODBYE_COMMAND_ID,
            ValueType::None.as_u8(),
            flags::IS_LAST,
            0,
            0,
        );
        self.writer.send(OutboundFrame::empty(&header));
        self.correlator.abort_all();
    }

    /// Whether the link has been closed locally or by the peer.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of queries still awaiting a response.
    pub fn pending_queries(&self) -> usize {
        self.correlator.outstanding()
    }

    /// Wait until the peer disconnects or the link is torn down.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn send_plain(&self, command_id: u16, value: &Value) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(command_id, "link closed, dropping command");
            return;
        }
        let payload = value.encode();
        let header = Header::new(
            command_id,
            value.kind().as_u8(),
            0,
            0,
            payload.len() as u32,
        );
        self.writer.send(OutboundFrame::new(&header, payload));
    }

    fn check_command_id(&self, command_id: u16) {
        assert!(
            command_id < self.command_count,
            "command id {} out of range (count {})",
            command_id,
            self.command_count
        );
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader loop - decodes frames and routes them until the stream ends.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    inbox: Inbox,
    correlator: &QueryCorrelator,
    writer: WriterHandle,
    max_payload: u32,
    read_buffer: usize,
) {
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload);
    let mut buf = vec![0u8; read_buffer];

    'outer: loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "pipe read failed");
                break;
            }
        };

        let frames = match frame_buffer.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                // The stream cannot be resynchronized after a bad header.
                tracing::error!(error = %e, "protocol violation, closing link");
                break;
            }
        };

        for frame in frames {
            let last = frame.is_last();
            route_frame(frame, &inbox, correlator, &writer);
            if last {
                tracing::debug!("peer sent its final message");
                break 'outer;
            }
        }
    }
}

/// Route one inbound frame. Runs on the reader task; must never invoke
/// application handlers or block on them.
fn route_frame(frame: Frame, inbox: &Inbox, correlator: &QueryCorrelator, writer: &WriterHandle) {
    if frame.is_response() {
        let result = match frame.view() {
            Ok(view) => view.as_str().unwrap_or_default().to_string(),
            Err(e) => {
                tracing::warn!(
                    correlation_id = frame.correlation_id(),
                    error = %e,
                    "malformed query response, resolving empty"
                );
                String::new()
            }
        };
        correlator.fulfill(frame.correlation_id(), result);
        return;
    }

    if frame.is_query() {
        let view = match frame.view() {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(command_id = frame.command_id(), error = %e, "dropping malformed query");
                return;
            }
        };
        let reply_rx = inbox.push_query(frame.command_id(), view);
        let reply_writer = writer.clone();
        let command_id = frame.command_id();
        let correlation_id = frame.correlation_id();
        tokio::spawn(async move {
            // Resolves when the owner thread ticks; empty if it never does.
            let result = reply_rx.await.unwrap_or_default();
            let payload = Bytes::from(result.into_bytes());
            let header = Header::new(
                command_id,
                ValueType::Str.as_u8(),
                flags::IS_RESPONSE,
                correlation_id,
                payload.len() as u32,
            );
            reply_writer.send(OutboundFrame::new(&header, payload));
        });
        return;
    }

    if frame.is_batch() {
        inbox.push_batch(frame.payload());
        return;
    }

    if frame.is_goodbye() {
        // Carries nothing; the IS_LAST flag already did its work.
        return;
    }

    match frame.view() {
        Ok(view) => inbox.push_command(frame.command_id(), view),
        Err(e) => {
            tracing::warn!(command_id = frame.command_id(), error = %e, "dropping malformed frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use std::sync::atomic::AtomicU32;

    /// Two links joined by an in-memory duplex stream, one dispatcher
    /// each: (engine link, engine dispatcher, panel link, panel
    /// dispatcher).
    fn make_pair(command_count: u16) -> (Arc<Link>, Dispatcher, Arc<Link>, Dispatcher) {
        let engine_dispatcher = Dispatcher::new(command_count);
        let panel_dispatcher = Dispatcher::new(command_count);

        let (engine_io, panel_io) = tokio::io::duplex(64 * 1024);
        let engine_link =
            Arc::new(Link::builder(Channel::named("test"), engine_dispatcher.inbox()).over(engine_io));
        let panel_link =
            Arc::new(Link::builder(Channel::named("test"), panel_dispatcher.inbox()).over(panel_io));

        (engine_link, engine_dispatcher, panel_link, panel_dispatcher)
    }

    /// Tick `dispatcher` until `done` reports true or the deadline hits.
    async fn tick_until(dispatcher: &mut Dispatcher, mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            dispatcher.tick();
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached before deadline");
    }

    #[tokio::test]
    async fn test_command_reaches_peer_handler() {
        let (_engine_link, mut engine_dispatcher, panel_link, _pd) = make_pair(8);

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        engine_dispatcher.on_command(3, move |v| {
            *seen_clone.lock().unwrap() = v.as_int();
        });

        panel_link.send(3, &Value::Int(1234));

        tick_until(&mut engine_dispatcher, || seen.lock().unwrap().is_some()).await;
        assert_eq!(*seen.lock().unwrap(), Some(1234));
    }

    #[tokio::test]
    async fn test_commands_keep_wire_order() {
        let (_engine_link, mut engine_dispatcher, panel_link, _pd) = make_pair(8);

        let log = Arc::new(Mutex::new(Vec::new()));
        for id in [1u16, 2] {
            let log_clone = log.clone();
            engine_dispatcher.on_command(id, move |v| {
                log_clone.lock().unwrap().push((id, v.as_int().unwrap()));
            });
        }

        for i in 0..5 {
            panel_link.send(1, &Value::Int(i));
            panel_link.send(2, &Value::Int(i));
        }

        tick_until(&mut engine_dispatcher, || log.lock().unwrap().len() == 10).await;

        let log = log.lock().unwrap();
        for i in 0..5 {
            assert_eq!(log[i * 2], (1, i as i32));
            assert_eq!(log[i * 2 + 1], (2, i as i32));
        }
    }

    #[tokio::test]
    async fn test_query_resolves_after_peer_tick() {
        let (_engine_link, mut engine_dispatcher, panel_link, _pd) = make_pair(16);

        engine_dispatcher.on_query(10, |_| "42".to_string());

        let link = panel_link.clone();
        let task = tokio::spawn(async move { link.query(10, &Value::None).await });

        tick_until(&mut engine_dispatcher, || task.is_finished()).await;
        assert_eq!(task.await.unwrap(), "42");
    }

    #[tokio::test]
    async fn test_concurrent_queries_resolve_independently() {
        let (_engine_link, mut engine_dispatcher, panel_link, _pd) = make_pair(16);

        engine_dispatcher.on_query(1, |_| "one".to_string());
        engine_dispatcher.on_query(2, |_| "two".to_string());

        let link1 = panel_link.clone();
        let q1 = tokio::spawn(async move { link1.query(1, &Value::None).await });
        let link2 = panel_link.clone();
        let q2 = tokio::spawn(async move { link2.query(2, &Value::None).await });

        tick_until(&mut engine_dispatcher, || {
            q1.is_finished() && q2.is_finished()
        })
        .await;

        assert_eq!(q1.await.unwrap(), "one");
        assert_eq!(q2.await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_query_without_handler_resolves_empty() {
        let (_engine_link, mut engine_dispatcher, panel_link, _pd) = make_pair(16);

        let link = panel_link.clone();
        let task = tokio::spawn(async move { link.query(9, &Value::None).await });

        tick_until(&mut engine_dispatcher, || task.is_finished()).await;
        assert_eq!(task.await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_composite_flushes_latest_values_once() {
        let (_engine_link, mut engine_dispatcher, panel_link, _pd) = make_pair(8);

        let hits = Arc::new(AtomicU32::new(0));
        let last = Arc::new(Mutex::new(0));
        let hits_clone = hits.clone();
        let last_clone = last.clone();
        engine_dispatcher.on_command(4, move |v| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            *last_clone.lock().unwrap() = v.as_int().unwrap();
        });

        panel_link.begin_composite();
        panel_link.send(4, &Value::Int(1));
        panel_link.send(4, &Value::Int(2));
        assert_eq!(panel_link.composite_len(), Some(1));
        panel_link.end_composite();

        tick_until(&mut engine_dispatcher, || {
            hits.load(Ordering::SeqCst) > 0
        })
        .await;

        // Allow any stragglers to surface before asserting "exactly once".
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine_dispatcher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(*last.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_composite_sends_nothing() {
        let (_engine_link, _ed, panel_link, _pd) = make_pair(8);
        panel_link.begin_composite();
        panel_link.end_composite();
        assert_eq!(panel_link.composite_len(), None);
    }

    #[tokio::test]
    async fn test_close_resolves_pending_queries_empty() {
        let (_engine_link, _engine_dispatcher, panel_link, _pd) = make_pair(8);

        // The engine never ticks, so this query would hang forever
        // without the shutdown path.
        let link = panel_link.clone();
        let task = tokio::spawn(async move { link.query(1, &Value::None).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(panel_link.pending_queries(), 1);

        panel_link.close();
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .unwrap()
                .unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_engine_link, _ed, panel_link, _pd) = make_pair(8);
        panel_link.close();
        panel_link.close();
        assert!(panel_link.is_closed());
        // Sends after close are silent drops, not panics.
        panel_link.send(1, &Value::None);
    }

    #[tokio::test]
    async fn test_goodbye_tears_down_peer() {
        let (engine_link, _ed, panel_link, _pd) = make_pair(8);

        panel_link.close();
        tokio::time::timeout(Duration::from_secs(1), engine_link.wait_for_shutdown())
            .await
            .expect("engine side should observe the goodbye");
    }

    #[tokio::test]
    async fn test_send_last_marks_and_closes() {
        let (_engine_link, mut engine_dispatcher, panel_link, _pd) = make_pair(8);

        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();
        engine_dispatcher.on_command(2, move |v| {
            seen_clone.store(v.as_int().unwrap() as u32, Ordering::SeqCst);
        });

        panel_link.send_last(2, &Value::Int(7));
        assert!(panel_link.is_closed());

        tick_until(&mut engine_dispatcher, || {
            seen.load(Ordering::SeqCst) == 7
        })
        .await;
    }

    #[tokio::test]
    async fn test_query_timeout_resolves_empty() {
        let engine_dispatcher = Dispatcher::new(8);
        let panel_dispatcher = Dispatcher::new(8);

        let (engine_io, panel_io) = tokio::io::duplex(4096);
        let _engine_link =
            Link::builder(Channel::named("t"), engine_dispatcher.inbox()).over(engine_io);
        let panel_link = Link::builder(Channel::named("t"), panel_dispatcher.inbox())
            .query_timeout(Duration::from_millis(50))
            .over(panel_io);

        // The engine never ticks; the timeout must fire.
        let result = panel_link.query(1, &Value::None).await;
        assert_eq!(result, "");
        assert_eq!(panel_link.pending_queries(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "out of range")]
    async fn test_out_of_range_send_panics() {
        let (_engine_link, _ed, panel_link, _pd) = make_pair(8);
        panel_link.send(8, &Value::None);
    }

    #[tokio::test]
    async fn test_frame_with_unknown_peer_id_ignored() {
        // The panel speaks a newer protocol with more ids than the
        // engine's table; the extra command must vanish quietly.
        let engine_dispatcher = Dispatcher::new(4);
        let panel_dispatcher = Dispatcher::new(64);

        let (engine_io, panel_io) = tokio::io::duplex(4096);
        let _engine_link =
            Link::builder(Channel::named("t"), engine_dispatcher.inbox()).over(engine_io);
        let panel_link = Link::builder(Channel::named("t"), panel_dispatcher.inbox()).over(panel_io);

        let mut engine_dispatcher = engine_dispatcher;
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();
        engine_dispatcher.on_command(1, move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        panel_link.send(42, &Value::Int(5)); // beyond the engine's table
        panel_link.send(1, &Value::None);

        tick_until(&mut engine_dispatcher, || {
            seen.load(Ordering::SeqCst) == 1
        })
        .await;
    }
}
