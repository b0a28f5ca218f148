//! Batch envelope encoding and the sender-side composite buffer.
//!
//! A burst of configuration updates ("apply this whole settings page") is
//! cheaper as one transport write than as N. The sender accumulates
//! commands in a [`CompositeBuffer`] and flushes them as a single batch
//! frame; the receiving dispatcher unbatches before enqueueing, so
//! handlers cannot tell batched and unbatched delivery apart.
//!
//! Envelope payload layout, repeated per entry:
//!
//! ```text
//! ┌────────────┬────────────┬────────────┬─────────────┐
//! │ command id │ value type │ value len  │ value bytes │
//! │ 2 bytes LE │ 1 byte     │ 4 bytes LE │ variable    │
//! └────────────┴────────────┴────────────┴─────────────┘
//! ```
//!
//! Buffered entries are de-duplicated by command id with the latest value
//! winning - safe only for idempotent "setter" commands, which is the
//! documented precondition for composite mode. A replaced entry keeps its
//! original position in the flush order.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use super::value::Value;
use crate::error::{LinkError, Result};

/// Fixed per-entry overhead in the envelope (id + tag + length).
const ENTRY_HEADER_SIZE: usize = 7;

/// One decoded batch entry, still undispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Command id of the sub-frame.
    pub command_id: u16,
    /// Raw value-type tag of the sub-frame.
    pub value_type: u8,
    /// Sub-frame payload.
    pub value: Bytes,
}

/// Decode a batch envelope payload into its entries, in emission order.
///
/// # Errors
///
/// Returns [`LinkError::MalformedFrame`] if the payload is truncated
/// mid-entry. Entries decoded before the truncation point are discarded
/// with the rest; a batch either decomposes losslessly or not at all.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<BatchEntry>> {
    let mut entries = Vec::new();
    let mut rest = payload;

    while !rest.is_empty() {
        if rest.len() < ENTRY_HEADER_SIZE {
            return Err(LinkError::MalformedFrame(format!(
                "batch entry header truncated ({} bytes left)",
                rest.len()
            )));
        }
        let command_id = u16::from_le_bytes([rest[0], rest[1]]);
        let value_type = rest[2];
        let value_len = u32::from_le_bytes([rest[3], rest[4], rest[5], rest[6]]) as usize;
        rest = &rest[ENTRY_HEADER_SIZE..];

        if rest.len() < value_len {
            return Err(LinkError::MalformedFrame(format!(
                "batch entry value truncated (need {}, have {})",
                value_len,
                rest.len()
            )));
        }
        entries.push(BatchEntry {
            command_id,
            value_type,
            value: Bytes::copy_from_slice(&rest[..value_len]),
        });
        rest = &rest[value_len..];
    }

    Ok(entries)
}

/// Accumulates outgoing setter commands for a single batched flush.
#[derive(Debug, Default)]
pub struct CompositeBuffer {
    /// Entries in first-insertion order.
    entries: Vec<(u16, Value)>,
    /// Command id -> index into `entries`.
    index: HashMap<u16, usize>,
}

impl CompositeBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a command, replacing the value of an already-buffered id.
    pub fn push(&mut self, command_id: u16, value: Value) {
        match self.index.get(&command_id) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(command_id, self.entries.len());
                self.entries.push((command_id, value));
            }
        }
    }

    /// Number of distinct buffered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the buffered commands as one batch envelope payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for (command_id, value) in &self.entries {
            let encoded = value.encode();
            buf.put_u16_le(*command_id);
            buf.put_u8(value.kind().as_u8());
            buf.put_u32_le(encoded.len() as u32);
            buf.put_slice(&encoded);
        }
        buf.freeze()
    }
}

/// Encode an ordered command sequence as a batch envelope payload.
///
/// Unlike [`CompositeBuffer`], this performs no de-duplication; it is the
/// raw envelope builder.
#[must_use]
pub fn encode_batch(commands: &[(u16, Value)]) -> Bytes {
    let mut buf = BytesMut::new();
    for (command_id, value) in commands {
        let encoded = value.encode();
        buf.put_u16_le(*command_id);
        buf.put_u8(value.kind().as_u8());
        buf.put_u32_le(encoded.len() as u32);
        buf.put_slice(&encoded);
    }
    buf.freeze()
}
