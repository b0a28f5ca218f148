//! Wire format encoding and decoding.
//!
//! Implements the 12-byte header format:
//! ```text
//! ┌────────────┬────────────┬───────┬─────────────┬────────────┐
//! │ Command ID │ Value type │ Flags │ Correlation │ Length     │
//! │ 2 bytes    │ 1 byte     │ 1 byte│ 4 bytes     │ 4 bytes    │
//! │ uint16 LE  │            │       │ uint32 LE   │ uint32 LE  │
//! └────────────┴────────────┴───────┴─────────────┴────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian, matching the element
//! encoding of the payload layer.

use crate::error::{LinkError, Result};

/// Header size in bytes (fixed, exactly 12).
pub const HEADER_SIZE: usize = 12;

/// Default maximum payload size (16 MB).
///
/// Configuration traffic is small; anything near this bound indicates a
/// corrupted length field rather than a real message.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Reserved command id for the batch envelope.
pub const BATCH_COMMAND_ID: u16 = 0xFFFF;

/// Reserved command id for the bare goodbye frame sent at shutdown.
pub const GOODBYE_COMMAND_ID: u16 = 0xFFFE;

/// Highest usable handler-table capacity (ids 0..MAX_COMMAND_CAPACITY).
pub const MAX_COMMAND_CAPACITY: u16 = 0xFFFE;

/// Flag constants for the protocol.
pub mod flags {
    /// Query: request expecting exactly one string response.
    pub const IS_QUERY: u8 = 0b0000_0001;
    /// Response: carries a query result back to its sender.
    pub const IS_RESPONSE: u8 = 0b0000_0010;
    /// Last message before the sender shuts down.
    pub const IS_LAST: u8 = 0b0000_0100;

    /// Reserved bits mask (bits 3-7).
    pub const RESERVED_MASK: u8 = 0b1111_1000;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command identifier (dense application range, or a reserved id).
    pub command_id: u16,
    /// Raw value-type tag (see [`ValueType`](crate::codec::ValueType);
    /// kept raw here so header decoding stays total).
    pub value_type: u8,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Correlation identifier (0 = plain command, nonzero for
    /// query/response pairing).
    pub correlation_id: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(
        command_id: u16,
        value_type: u8,
        flags: u8,
        correlation_id: u32,
        payload_length: u32,
    ) -> Self {
        Self {
            command_id,
            value_type,
            flags,
            correlation_id,
            payload_length,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use scenelink::protocol::{Header, flags};
    ///
    /// let header = Header::new(1, 2, flags::IS_QUERY, 42, 4);
    /// assert_eq!(header.encode().len(), 12);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (12 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..2].copy_from_slice(&self.command_id.to_le_bytes());
        buf[2] = self.value_type;
        buf[3] = self.flags;
        buf[4..8].copy_from_slice(&self.correlation_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.payload_length.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short. Decoding is total: any
    /// 12 bytes produce a header; semantic checks live in [`validate`].
    ///
    /// [`validate`]: Header::validate
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            command_id: u16::from_le_bytes([buf[0], buf[1]]),
            value_type: buf[2],
            flags: buf[3],
            correlation_id: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            payload_length: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    ///
    /// Command-id range is deliberately NOT checked here: an id the local
    /// table doesn't know may simply come from a newer peer and is
    /// dropped quietly at dispatch, not treated as a protocol error.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(LinkError::Protocol(format!(
                "payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(LinkError::Protocol(
                "reserved flag bits must be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if this is a query request.
    #[inline]
    pub fn is_query(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_QUERY)
    }

    /// Check if this is a query response.
    #[inline]
    pub fn is_response(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_RESPONSE)
    }

    /// Check if this is the sender's final message.
    #[inline]
    pub fn is_last(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_LAST)
    }

    /// Check if this is a batch envelope.
    #[inline]
    pub fn is_batch(&self) -> bool {
        self.command_id == BATCH_COMMAND_ID
    }

    /// Check if this is a bare goodbye frame.
    #[inline]
    pub fn is_goodbye(&self) -> bool {
        self.command_id == GOODBYE_COMMAND_ID
    }
}
