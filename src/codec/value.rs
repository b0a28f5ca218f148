//! Typed wire values.
//!
//! Every frame carries exactly one value of one of eight kinds. Scalars
//! (bool/int/float) encode to fixed-width payloads, strings are UTF-8 with
//! the length implicit from the frame, and numeric arrays are packed
//! little-endian elements.
//!
//! Percentage- and length-like settings are carried as integers scaled by
//! 100 ("37.5%" travels as `Int(3750)`), never as formatted floats - both
//! processes must apply the same scale.
//!
//! # Example
//!
//! ```
//! use scenelink::codec::{Value, ValueType};
//!
//! let value = Value::Str("front camera".to_string());
//! assert_eq!(value.kind(), ValueType::Str);
//! assert_eq!(value.encode(), b"front camera".as_ref());
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Scale factor for fixed-point percent values (hundredths).
pub const PERCENT_SCALE: f32 = 100.0;

/// Wire tag describing the payload encoding of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Empty payload.
    None = 0,
    /// 1 byte, 0 or 1.
    Bool = 1,
    /// 4-byte little-endian signed integer.
    Int = 2,
    /// 4-byte IEEE-754 little-endian float.
    Float = 3,
    /// UTF-8 bytes, no terminator.
    Str = 4,
    /// Raw bytes.
    Bytes = 5,
    /// N × 4-byte little-endian signed integers.
    IntArray = 6,
    /// N × 4-byte little-endian floats.
    FloatArray = 7,
}

impl ValueType {
    /// Create a value type from its wire tag.
    ///
    /// Returns `None` for tags outside 0–7; such frames are malformed.
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Bool),
            2 => Some(Self::Int),
            3 => Some(Self::Float),
            4 => Some(Self::Str),
            5 => Some(Self::Bytes),
            6 => Some(Self::IntArray),
            7 => Some(Self::FloatArray),
            _ => None,
        }
    }

    /// The wire tag for this value type.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// An owned, typed value ready to be sent.
///
/// The receiving side works with [`ValueView`](crate::codec::ValueView)
/// instead, which defers string/array decoding until first access.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No payload (pure trigger commands).
    None,
    /// Boolean flag.
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit float.
    Float(f32),
    /// UTF-8 string.
    Str(String),
    /// Opaque bytes.
    Bytes(Bytes),
    /// Packed integer array.
    IntArray(Vec<i32>),
    /// Packed float array.
    FloatArray(Vec<f32>),
}

impl Value {
    /// The wire tag matching this value's kind.
    #[must_use]
    pub fn kind(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::Bytes(_) => ValueType::Bytes,
            Value::IntArray(_) => ValueType::IntArray,
            Value::FloatArray(_) => ValueType::FloatArray,
        }
    }

    /// Encode the value into its wire payload.
    ///
    /// Encoding is total: every value of every kind has exactly one
    /// payload, and decoding it back yields an equal value.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        match self {
            Value::None => Bytes::new(),
            Value::Bool(b) => {
                if *b {
                    Bytes::from_static(&[1])
                } else {
                    Bytes::from_static(&[0])
                }
            }
            Value::Int(n) => Bytes::copy_from_slice(&n.to_le_bytes()),
            Value::Float(f) => Bytes::copy_from_slice(&f.to_le_bytes()),
            Value::Str(s) => Bytes::copy_from_slice(s.as_bytes()),
            Value::Bytes(b) => b.clone(),
            Value::IntArray(items) => {
                let mut buf = BytesMut::with_capacity(items.len() * 4);
                for n in items {
                    buf.put_i32_le(*n);
                }
                buf.freeze()
            }
            Value::FloatArray(items) => {
                let mut buf = BytesMut::with_capacity(items.len() * 4);
                for f in items {
                    buf.put_f32_le(*f);
                }
                buf.freeze()
            }
        }
    }

    /// Build an `Int` value carrying a percentage in hundredths.
    ///
    /// `37.5` becomes `Int(3750)`. The peer reads it back with
    /// [`ValueView::as_percent`](crate::codec::ValueView::as_percent);
    /// floats never cross the wire as formatted text, so the result is
    /// identical regardless of either process's locale.
    #[must_use]
    pub fn from_percent(percent: f32) -> Self {
        Value::Int((percent * PERCENT_SCALE).round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_tag_roundtrip() {
        for tag in 0u8..=7 {
            let vt = ValueType::from_u8(tag).unwrap();
            assert_eq!(vt.as_u8(), tag);
        }
    }

    #[test]
    fn test_value_type_unknown_tag_rejected() {
        assert!(ValueType::from_u8(8).is_none());
        assert!(ValueType::from_u8(255).is_none());
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Value::None.kind(), ValueType::None);
        assert_eq!(Value::Bool(true).kind(), ValueType::Bool);
        assert_eq!(Value::Int(1).kind(), ValueType::Int);
        assert_eq!(Value::Float(1.0).kind(), ValueType::Float);
        assert_eq!(Value::Str(String::new()).kind(), ValueType::Str);
        assert_eq!(Value::Bytes(Bytes::new()).kind(), ValueType::Bytes);
        assert_eq!(Value::IntArray(vec![]).kind(), ValueType::IntArray);
        assert_eq!(Value::FloatArray(vec![]).kind(), ValueType::FloatArray);
    }

    #[test]
    fn test_encode_none_is_empty() {
        assert!(Value::None.encode().is_empty());
    }

    #[test]
    fn test_encode_bool() {
        assert_eq!(Value::Bool(false).encode().as_ref(), &[0]);
        assert_eq!(Value::Bool(true).encode().as_ref(), &[1]);
    }

    #[test]
    fn test_encode_int_little_endian() {
        let encoded = Value::Int(0x0102_0304).encode();
        assert_eq!(encoded.as_ref(), &[0x04, 0x03, 0x02, 0x01]);

        let negative = Value::Int(-1).encode();
        assert_eq!(negative.as_ref(), &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_float_width() {
        let encoded = Value::Float(1.5).encode();
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded.as_ref(), &1.5f32.to_le_bytes());
    }

    #[test]
    fn test_encode_string_utf8_no_terminator() {
        let encoded = Value::Str("héllo".to_string()).encode();
        assert_eq!(encoded.as_ref(), "héllo".as_bytes());
    }

    #[test]
    fn test_encode_int_array_packed() {
        let encoded = Value::IntArray(vec![1, -1]).encode();
        assert_eq!(encoded.len(), 8);
        assert_eq!(&encoded[..4], &1i32.to_le_bytes());
        assert_eq!(&encoded[4..], &(-1i32).to_le_bytes());
    }

    #[test]
    fn test_encode_float_array_packed() {
        let encoded = Value::FloatArray(vec![0.5, 2.25, -8.0]).encode();
        assert_eq!(encoded.len(), 12);
        assert_eq!(&encoded[4..8], &2.25f32.to_le_bytes());
    }

    #[test]
    fn test_from_percent_scales_to_hundredths() {
        assert_eq!(Value::from_percent(37.5), Value::Int(3750));
        assert_eq!(Value::from_percent(0.0), Value::Int(0));
        assert_eq!(Value::from_percent(100.0), Value::Int(10000));
    }

    #[test]
    fn test_from_percent_rounds() {
        // 12.345% → 1234.5 hundredths → 1235 (round half away from zero)
        assert_eq!(Value::from_percent(12.345), Value::Int(1235));
    }
}
