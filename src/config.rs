//! Link configuration.
//!
//! The GUI process persists its settings as JSON; the link-related knobs
//! live in [`LinkConfig`] so both the settings file and the launch code
//! share one schema. Everything has a default - an empty JSON object is
//! a valid configuration.
//!
//! # Example
//!
//! ```
//! use scenelink::config::LinkConfig;
//!
//! let config = LinkConfig::from_json_str(r#"{"queryTimeoutMs": 3000}"#).unwrap();
//! assert_eq!(config.query_timeout_ms, Some(3000));
//! assert_eq!(config.connect_timeout_ms, 10_000);
//! ```

use serde::{Deserialize, Serialize};

use crate::link::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUFFER_SIZE};
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::transport::Channel;
use crate::error::Result;

/// Tunable link settings, JSON-serializable for settings persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkConfig {
    /// Fixed channel name; `None` means a randomized per-run name.
    pub channel: Option<String>,
    /// Query timeout in milliseconds; `None` means unbounded.
    pub query_timeout_ms: Option<u64>,
    /// How long `connect()` retries before giving up, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum accepted payload size for incoming frames.
    pub max_payload_bytes: u32,
    /// Read buffer size for the reader task.
    pub read_buffer_bytes: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            channel: None,
            query_timeout_ms: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_bytes: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl LinkConfig {
    /// Parse a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Json`](crate::LinkError::Json) on malformed
    /// JSON or mistyped fields.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize this configuration to a JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolve the channel this configuration names.
    ///
    /// A configured fixed name wins (single-instance/debug use);
    /// otherwise a per-run unique name is generated from `prefix`.
    pub fn channel(&self, prefix: &str) -> Channel {
        match &self.channel {
            Some(name) => Channel::named(name.clone()),
            None => Channel::unique(prefix),
        }
    }
}
