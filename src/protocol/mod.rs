//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary protocol of the link:
//! - 12-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    flags, Header, BATCH_COMMAND_ID, DEFAULT_MAX_PAYLOAD_SIZE, GOODBYE_COMMAND_ID, HEADER_SIZE,
    MAX_COMMAND_CAPACITY,
};
