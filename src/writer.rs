//! Dedicated writer task for outgoing frames.
//!
//! All outgoing traffic funnels through one task that owns the write
//! half of the pipe, so senders never share a lock around the stream:
//!
//! ```text
//! send()  ─┐
//! query() ─┼─► mpsc::UnboundedSender<OutboundFrame> ─► Writer Task ─► Pipe
//! replies ─┘
//! ```
//!
//! Delivery is fire-and-forget: [`WriterHandle::send`] is synchronous,
//! never blocks, and never surfaces transport errors to the caller - a
//! dead pipe is logged by the writer task and subsequent frames are
//! dropped. Frames that are ready together are written together with
//! vectored I/O to keep syscall counts down during bursts.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::{Header, HEADER_SIZE};

/// Maximum frames to gather into a single vectored write.
const MAX_WRITE_BATCH: usize = 64;

/// A frame ready to be written to the pipe.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header (12 bytes).
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (may be empty).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Create a new outbound frame with empty payload.
    #[inline]
    pub fn empty(header: &Header) -> Self {
        Self {
            header: header.encode(),
            payload: Bytes::new(),
        }
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable; shared by the link surface and the reply tasks.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame for writing. Never blocks.
    ///
    /// Returns whether the frame was accepted; `false` means the writer
    /// task has already exited (peer gone), which callers treat as a
    /// silent drop.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        if self.tx.send(frame).is_err() {
            tracing::debug!("writer gone, dropping outgoing frame");
            return false;
        }
        true
    }
}

/// Spawn the writer task and return a handle for sending frames.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives frames and writes them to the pipe.
///
/// Exits when every handle is dropped (clean shutdown) or on the first
/// write error (peer gone); either way the error stays on this side of
/// the boundary.
async fn writer_loop<W>(mut rx: mpsc::UnboundedReceiver<OutboundFrame>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(frame) => frame,
            None => return,
        };

        // Collect additional ready frames (non-blocking).
        let mut batch = Vec::with_capacity(MAX_WRITE_BATCH);
        batch.push(first);
        while batch.len() < MAX_WRITE_BATCH {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::warn!(error = %e, "pipe write failed, stopping writer");
            return;
        }
    }
}

/// Write a gathered batch of frames using vectored I/O.
///
/// The fast path is a single `write_vectored` covering every header and
/// payload; on a partial write the remaining slices are rebuilt and
/// retried until the batch is fully flushed.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let mut slices: Vec<IoSlice<'_>> = Vec::with_capacity(batch.len() * 2);
    for frame in batch {
        slices.push(IoSlice::new(&frame.header));
        if !frame.payload.is_empty() {
            slices.push(IoSlice::new(&frame.payload));
        }
    }

    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = writer.write_vectored(&slices).await?;

    if total_written == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "write_vectored returned 0",
        ));
    }

    while total_written < total_size {
        let remaining = build_remaining_slices(batch, total_written);
        if remaining.is_empty() {
            break;
        }

        let written = writer.write_vectored(&remaining).await?;
        if written == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            ));
        }
        total_written += written;
    }

    writer.flush().await
}

/// Build the IoSlice array for data still unwritten after a partial write.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut skipped = 0;

    for frame in batch {
        let header_start = skipped;
        let header_end = skipped + HEADER_SIZE;

        if skip_bytes < header_end {
            let start_in_header = skip_bytes.saturating_sub(header_start);
            slices.push(IoSlice::new(&frame.header[start_in_header..]));
        }
        skipped = header_end;

        if !frame.payload.is_empty() {
            let payload_start = skipped;
            let payload_end = skipped + frame.payload.len();

            if skip_bytes < payload_end {
                let start_in_payload = skip_bytes.saturating_sub(payload_start);
                slices.push(IoSlice::new(&frame.payload[start_in_payload..]));
            }
            skipped = payload_end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::duplex;

    fn frame_of(command_id: u16, payload: &'static [u8]) -> OutboundFrame {
        let header = Header::new(command_id, 5, 0, 0, payload.len() as u32);
        OutboundFrame::new(&header, Bytes::from_static(payload))
    }

    #[test]
    fn test_outbound_frame_creation() {
        let frame = frame_of(1, b"hello");
        assert_eq!(frame.header.len(), HEADER_SIZE);
        assert_eq!(frame.payload.len(), 5);
        assert_eq!(frame.size(), HEADER_SIZE + 5);
    }

    #[test]
    fn test_outbound_frame_empty() {
        let header = Header::new(1, 0, 0, 0, 0);
        let frame = OutboundFrame::empty(&header);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.size(), HEADER_SIZE);
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client);

        assert!(handle.send(frame_of(1, b"hello")));

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut buf = vec![0u8; 64];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf)
            .await
            .unwrap();
        assert_eq!(n, HEADER_SIZE + 5);
    }

    #[tokio::test]
    async fn test_writer_batching() {
        let (client, mut server) = duplex(8192);
        let (handle, _task) = spawn_writer_task(client);

        for _ in 0..10 {
            assert!(handle.send(frame_of(1, b"data")));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut buf = vec![0u8; 1024];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf)
            .await
            .unwrap();
        assert_eq!(n, 10 * (HEADER_SIZE + 4));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_handle_drop() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_peer_gone_is_silent() {
        let (client, server) = duplex(64);
        let (handle, task) = spawn_writer_task(client);

        drop(server);
        // Enough writes to hit the dead pipe and stop the task.
        for _ in 0..64 {
            handle.send(frame_of(1, b"xxxxxxxxxxxxxxxx"));
            tokio::time::sleep(Duration::from_millis(1)).await;
            if task.is_finished() {
                break;
            }
        }

        // Further sends report the drop without panicking or blocking.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _ = handle.send(frame_of(1, b"late"));
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![frame_of(1, b"hello")];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2); // header + payload
    }

    #[test]
    fn test_build_remaining_slices_partial_header() {
        let batch = vec![frame_of(1, b"hello")];
        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), HEADER_SIZE - 5);
        assert_eq!(slices[1].len(), 5);
    }

    #[test]
    fn test_build_remaining_slices_skip_header() {
        let batch = vec![frame_of(1, b"hello")];
        let slices = build_remaining_slices(&batch, HEADER_SIZE);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), 5);
    }

    #[tokio::test]
    async fn test_write_batch_single() {
        let mut buf = Cursor::new(Vec::new());
        let batch = vec![frame_of(1, b"hello")];

        write_batch(&mut buf, &batch).await.unwrap();
        assert_eq!(buf.into_inner().len(), HEADER_SIZE + 5);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5).map(|i| frame_of(i, b"abc")).collect();

        write_batch(&mut buf, &batch).await.unwrap();
        assert_eq!(buf.into_inner().len(), 5 * (HEADER_SIZE + 3));
    }
}
