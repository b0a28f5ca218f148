//! Platform-specific pipe/socket implementation.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe
//!
//! The channel creator binds a listener and accepts exactly one peer;
//! the other process attaches by name. Because the GUI is usually
//! launched by the engine and may race it to the endpoint, the connector
//! retries until a deadline instead of failing on the first missing
//! endpoint.
//!
//! # Example
//!
//! ```ignore
//! use scenelink::transport::{Channel, PipeListener, connect_with_retry};
//! use std::time::Duration;
//!
//! let channel = Channel::unique("scenelink");
//! let listener = PipeListener::bind(&channel.endpoint()).await?;
//! // meanwhile, in the peer process:
//! let stream = connect_with_retry(&channel.endpoint(), Duration::from_secs(10)).await?;
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{LinkError, Result};

/// Interval between connection attempts while the endpoint is missing.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use std::path::Path;
    use tokio::net::{UnixListener, UnixStream};

    /// Unix Domain Socket listener.
    pub struct PipeListener {
        listener: UnixListener,
        path: String,
    }

    /// Unix Domain Socket stream (connected).
    pub struct PipeStream {
        stream: UnixStream,
    }

    impl PipeListener {
        /// Bind to a Unix socket path.
        ///
        /// Removes any existing socket file at the path before binding
        /// (a leftover from a crashed previous run).
        pub async fn bind(path: &str) -> Result<Self> {
            if Path::new(path).exists() {
                std::fs::remove_file(path)?;
            }

            let listener = UnixListener::bind(path)
                .map_err(|e| LinkError::Unavailable(format!("bind {}: {}", path, e)))?;

            Ok(Self {
                listener,
                path: path.to_string(),
            })
        }

        /// Accept the single peer connection.
        pub async fn accept(&self) -> Result<PipeStream> {
            let (stream, _addr) = self.listener.accept().await?;
            Ok(PipeStream { stream })
        }

        /// Get the socket path.
        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl Drop for PipeListener {
        fn drop(&mut self) {
            // Remove the socket file so a later run can rebind the name.
            let _ = std::fs::remove_file(&self.path);
        }
    }

    /// Connect to the peer's socket, retrying until `deadline` elapses.
    pub async fn connect_with_retry(path: &str, deadline: Duration) -> Result<PipeStream> {
        let start = std::time::Instant::now();
        loop {
            match UnixStream::connect(path).await {
                Ok(stream) => return Ok(PipeStream { stream }),
                Err(e) if start.elapsed() < deadline => {
                    tracing::debug!(path, error = %e, "channel not ready, retrying");
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
                Err(e) => {
                    return Err(LinkError::Unavailable(format!(
                        "connect {} timed out: {}",
                        path, e
                    )));
                }
            }
        }
    }

    impl PipeStream {
        /// Split into read and write halves.
        pub fn into_split(self) -> (impl AsyncRead + Send + Unpin, impl AsyncWrite + Send + Unpin)
        {
            self.stream.into_split()
        }
    }

    impl AsyncRead for PipeStream {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.stream).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for PipeStream {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::pin::Pin::new(&mut self.stream).poll_write(cx, buf)
        }

        fn poll_flush(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.stream).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.stream).poll_shutdown(cx)
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions};

    /// Windows Named Pipe listener.
    pub struct PipeListener {
        path: String,
        first: std::sync::Mutex<Option<NamedPipeServer>>,
    }

    /// Windows Named Pipe stream (connected, either side).
    pub struct PipeStream {
        inner: PipeInner,
    }

    enum PipeInner {
        Server(NamedPipeServer),
        Client(NamedPipeClient),
    }

    impl PipeListener {
        /// Create a Named Pipe server instance for the path.
        pub async fn bind(path: &str) -> Result<Self> {
            let server = ServerOptions::new()
                .first_pipe_instance(true)
                .create(path)
                .map_err(|e| LinkError::Unavailable(format!("create {}: {}", path, e)))?;

            Ok(Self {
                path: path.to_string(),
                first: std::sync::Mutex::new(Some(server)),
            })
        }

        /// Accept the single peer connection.
        pub async fn accept(&self) -> Result<PipeStream> {
            let server = match self.first.lock().expect("listener lock poisoned").take() {
                Some(server) => server,
                None => ServerOptions::new().create(&self.path).map_err(LinkError::Io)?,
            };

            server.connect().await?;

            Ok(PipeStream {
                inner: PipeInner::Server(server),
            })
        }

        /// Get the pipe path.
        pub fn path(&self) -> &str {
            &self.path
        }
    }

    /// Connect to the peer's pipe, retrying until `deadline` elapses.
    ///
    /// Retries cover both a not-yet-created pipe and the busy window
    /// between instance creation and `connect`.
    pub async fn connect_with_retry(path: &str, deadline: Duration) -> Result<PipeStream> {
        let start = std::time::Instant::now();
        loop {
            match ClientOptions::new().open(path) {
                Ok(client) => {
                    return Ok(PipeStream {
                        inner: PipeInner::Client(client),
                    })
                }
                Err(e) if start.elapsed() < deadline => {
                    tracing::debug!(path, error = %e, "channel not ready, retrying");
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
                Err(e) => {
                    return Err(LinkError::Unavailable(format!(
                        "connect {} timed out: {}",
                        path, e
                    )));
                }
            }
        }
    }

    impl PipeStream {
        /// Split into read and write halves.
        pub fn into_split(self) -> (impl AsyncRead + Send + Unpin, impl AsyncWrite + Send + Unpin)
        {
            tokio::io::split(self)
        }
    }

    impl AsyncRead for PipeStream {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            match &mut self.inner {
                PipeInner::Server(pipe) => std::pin::Pin::new(pipe).poll_read(cx, buf),
                PipeInner::Client(pipe) => std::pin::Pin::new(pipe).poll_read(cx, buf),
            }
        }
    }

    impl AsyncWrite for PipeStream {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            match &mut self.inner {
                PipeInner::Server(pipe) => std::pin::Pin::new(pipe).poll_write(cx, buf),
                PipeInner::Client(pipe) => std::pin::Pin::new(pipe).poll_write(cx, buf),
            }
        }

        fn poll_flush(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            match &mut self.inner {
                PipeInner::Server(pipe) => std::pin::Pin::new(pipe).poll_flush(cx),
                PipeInner::Client(pipe) => std::pin::Pin::new(pipe).poll_flush(cx),
            }
        }

        fn poll_shutdown(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            match &mut self.inner {
                PipeInner::Server(pipe) => std::pin::Pin::new(pipe).poll_shutdown(cx),
                PipeInner::Client(pipe) => std::pin::Pin::new(pipe).poll_shutdown(cx),
            }
        }
    }
}

// ============================================================================
// Platform-independent re-exports
// ============================================================================

#[cfg(unix)]
pub use unix_impl::{connect_with_retry, PipeListener, PipeStream};

#[cfg(windows)]
pub use windows_impl::{connect_with_retry, PipeListener, PipeStream};
