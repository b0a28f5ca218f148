//! Codec module - typed value encoding/decoding and the batch envelope.
//!
//! This module owns the payload layer of the protocol:
//!
//! - [`Value`] / [`ValueType`] - the eight supported value kinds and their
//!   total, symmetric wire encoding
//! - [`ValueView`] - lazy receiver-side view (scalars eager, strings and
//!   arrays decoded on first access)
//! - [`CompositeBuffer`] / [`decode_batch`] - latest-wins accumulation and
//!   lossless, order-preserving decomposition of batch frames
//!
//! # Example
//!
//! ```
//! use scenelink::codec::{Value, ValueType, ValueView};
//!
//! let sent = Value::from_percent(62.5);
//! let view = ValueView::new(sent.kind(), sent.encode()).unwrap();
//! assert_eq!(view.as_percent(), Some(62.5));
//! ```

mod batch;
mod value;
mod view;

pub use batch::{decode_batch, encode_batch, BatchEntry, CompositeBuffer};
pub use value::{Value, ValueType, PERCENT_SCALE};
pub use view::ValueView;
