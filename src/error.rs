//! Error types for scenelink.

use thiserror::Error;

/// Main error type for all scenelink operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error during pipe/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload length or type tag does not match what the frame claims.
    ///
    /// Malformed frames are dropped and logged at the link's reader
    /// boundary; they never reach handlers.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Protocol violation (oversized payload, reserved bits set, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Channel could not be created or reached (peer not up, name taken,
    /// OS primitive failed).
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;
