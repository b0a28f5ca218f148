//! Transport module - channel identity and platform pipe handling.
//!
//! Provides abstraction over:
//! - Unix Domain Sockets (Linux/macOS)
//! - Named Pipes (Windows)
//!
//! plus the [`Channel`] naming contract the two processes use to find
//! each other.

mod channel;
mod pipe;

pub use channel::{Channel, CHANNEL_ARG};
pub use pipe::{connect_with_retry, PipeListener, PipeStream};
