//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use scenelink::protocol::{Frame, Header, flags};
//! use bytes::Bytes;
//!
//! let header = Header::new(1, 4, 0, 0, 5);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.command_id(), 1);
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};
use crate::codec::{ValueType, ValueView};
use crate::error::{LinkError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the command ID.
    #[inline]
    pub fn command_id(&self) -> u16 {
        self.header.command_id
    }

    /// Get the correlation ID.
    #[inline]
    pub fn correlation_id(&self) -> u32 {
        self.header.correlation_id
    }

    /// Check if this is a query request.
    #[inline]
    pub fn is_query(&self) -> bool {
        self.header.is_query()
    }

    /// Check if this is a query response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    /// Check if this is the sender's final message.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.header.is_last()
    }

    /// Check if this is a batch envelope.
    #[inline]
    pub fn is_batch(&self) -> bool {
        self.header.is_batch()
    }

    /// Check if this is a bare goodbye frame.
    #[inline]
    pub fn is_goodbye(&self) -> bool {
        self.header.is_goodbye()
    }

    /// Build a validated lazy view over this frame's value.
    ///
    /// This is where the value-type tag and payload length are checked;
    /// the caller (the link's reader) drops and logs malformed frames.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedFrame`] on an unknown tag or a
    /// length that doesn't fit the tag.
    pub fn view(&self) -> Result<ValueView> {
        let kind = ValueType::from_u8(self.header.value_type).ok_or_else(|| {
            LinkError::MalformedFrame(format!(
                "unknown value type tag {}",
                self.header.value_type
            ))
        })?;
        ValueView::new(kind, self.payload.clone())
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes header and appends payload into a contiguous buffer.
///
/// # Example
///
/// ```
/// use scenelink::protocol::{build_frame, Header, HEADER_SIZE};
///
/// let header = Header::new(1, 4, 0, 0, 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), HEADER_SIZE + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
