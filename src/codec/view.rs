//! Lazy receiver-side value view.
//!
//! Most traffic between the engine and the GUI is cheap scalars (toggles,
//! sliders), so the common path must not allocate. A [`ValueView`] wraps
//! the raw payload `Bytes` after a single length/tag validation; scalar
//! accessors read directly from the buffer, while string and array
//! decoding happens only when a handler actually asks for it.
//!
//! # Example
//!
//! ```
//! use scenelink::codec::{Value, ValueType, ValueView};
//!
//! let payload = Value::Int(4200).encode();
//! let view = ValueView::new(ValueType::Int, payload).unwrap();
//! assert_eq!(view.as_int(), Some(4200));
//! assert_eq!(view.as_percent(), Some(42.0));
//! ```

use bytes::Bytes;

use super::value::{Value, ValueType, PERCENT_SCALE};
use crate::error::{LinkError, Result};

/// A validated, lazily-decoded view over one frame's payload.
#[derive(Debug, Clone)]
pub struct ValueView {
    kind: ValueType,
    payload: Bytes,
}

impl ValueView {
    /// Validate a payload against its declared type and wrap it.
    ///
    /// Length invariants are checked here, at the transport boundary, so
    /// handlers never observe a structurally broken payload:
    /// `None` must be empty, `Bool` exactly 1 byte, `Int`/`Float` exactly
    /// 4 bytes, and arrays a multiple of 4 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedFrame`] on any length mismatch.
    pub fn new(kind: ValueType, payload: Bytes) -> Result<Self> {
        let len = payload.len();
        let ok = match kind {
            ValueType::None => len == 0,
            ValueType::Bool => len == 1,
            ValueType::Int | ValueType::Float => len == 4,
            ValueType::Str | ValueType::Bytes => true,
            ValueType::IntArray | ValueType::FloatArray => len % 4 == 0,
        };
        if !ok {
            return Err(LinkError::MalformedFrame(format!(
                "payload length {} invalid for {:?}",
                len, kind
            )));
        }
        Ok(Self { kind, payload })
    }

    /// Build a view from an owned value (used for locally posted work).
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            kind: value.kind(),
            payload: value.encode(),
        }
    }

    /// The declared value kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ValueType {
        self.kind
    }

    /// Raw payload bytes, regardless of kind.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The boolean value, if this is a `Bool` frame.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ValueType::Bool => Some(self.payload[0] != 0),
            _ => None,
        }
    }

    /// The integer value, if this is an `Int` frame.
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self.kind {
            ValueType::Int => Some(i32::from_le_bytes(
                self.payload[..4].try_into().expect("validated length"),
            )),
            _ => None,
        }
    }

    /// The float value, if this is a `Float` frame.
    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self.kind {
            ValueType::Float => Some(f32::from_le_bytes(
                self.payload[..4].try_into().expect("validated length"),
            )),
            _ => None,
        }
    }

    /// A fixed-point percent carried as `Int` hundredths, as a float.
    #[inline]
    #[must_use]
    pub fn as_percent(&self) -> Option<f32> {
        self.as_int().map(|n| n as f32 / PERCENT_SCALE)
    }

    /// The string value, if this is a `Str` frame with valid UTF-8.
    ///
    /// UTF-8 validation is deferred to this first access; an invalid
    /// sequence yields `None` rather than tearing down dispatch.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self.kind {
            ValueType::Str => std::str::from_utf8(&self.payload).ok(),
            _ => None,
        }
    }

    /// The raw bytes, if this is a `Bytes` frame.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.kind {
            ValueType::Bytes => Some(&self.payload),
            _ => None,
        }
    }

    /// Decode the packed integer array, if this is an `IntArray` frame.
    ///
    /// Allocates on each call; cache the result if accessed repeatedly.
    #[must_use]
    pub fn int_array(&self) -> Option<Vec<i32>> {
        match self.kind {
            ValueType::IntArray => Some(
                self.payload
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes(c.try_into().expect("chunks_exact(4)")))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Decode the packed float array, if this is a `FloatArray` frame.
    #[must_use]
    pub fn float_array(&self) -> Option<Vec<f32>> {
        match self.kind {
            ValueType::FloatArray => Some(
                self.payload
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes(c.try_into().expect("chunks_exact(4)")))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Fully decode into an owned [`Value`].
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedFrame`] if a `Str` payload is not
    /// valid UTF-8 (the one check `new` defers).
    pub fn to_value(&self) -> Result<Value> {
        Ok(match self.kind {
            ValueType::None => Value::None,
            ValueType::Bool => Value::Bool(self.payload[0] != 0),
            ValueType::Int => Value::Int(self.as_int().expect("kind checked")),
            ValueType::Float => Value::Float(self.as_float().expect("kind checked")),
            ValueType::Str => Value::Str(
                std::str::from_utf8(&self.payload)
                    .map_err(|e| LinkError::MalformedFrame(format!("invalid UTF-8: {e}")))?
                    .to_string(),
            ),
            ValueType::Bytes => Value::Bytes(self.payload.clone()),
            ValueType::IntArray => Value::IntArray(self.int_array().expect("kind checked")),
            ValueType::FloatArray => Value::FloatArray(self.float_array().expect("kind checked")),
        })
    }
}
