//! Channel identity shared by the two processes.
//!
//! Both sides must agree on one process-wide channel name before either
//! can open the duplex pipe. The engine (the channel creator) picks the
//! name and passes it to the GUI process as a command-line argument at
//! launch. Normal runs use a randomized per-run name so concurrent
//! application instances never collide; a fixed well-known name exists
//! for single-instance/debug use.
//!
//! # Example
//!
//! ```
//! use scenelink::transport::Channel;
//!
//! let channel = Channel::unique("scenelink");
//! let args = channel.to_args();
//! let parsed = Channel::from_args(args.iter().cloned()).unwrap();
//! assert_eq!(parsed.name(), channel.name());
//! ```

/// Command-line flag carrying the channel name to the peer process.
pub const CHANNEL_ARG: &str = "--link-channel";

/// A named duplex channel between exactly two processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: String,
}

impl Channel {
    /// Use an explicit, fixed channel name.
    ///
    /// Only safe when at most one instance of the application runs at a
    /// time (debugging, attaching external tools).
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Generate a per-run unique channel name with the given prefix.
    ///
    /// Mixes the process id and a clock-derived value so two instances
    /// launched in the same instant still diverge.
    pub fn unique(prefix: &str) -> Self {
        Self {
            name: format!("{}-{}-{:x}", prefix, std::process::id(), clock_mix()),
        }
    }

    /// The channel name both processes agree on.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The OS endpoint this channel maps to.
    ///
    /// - Unix: `/tmp/{name}.sock`
    /// - Windows: `\\.\pipe\{name}`
    pub fn endpoint(&self) -> String {
        #[cfg(unix)]
        {
            format!("/tmp/{}.sock", self.name)
        }

        #[cfg(windows)]
        {
            format!(r"\\.\pipe\{}", self.name)
        }
    }

    /// The argument pair to append to the peer's launch command line.
    pub fn to_args(&self) -> [String; 2] {
        [CHANNEL_ARG.to_string(), self.name.clone()]
    }

    /// Recover the channel from a process argument list.
    ///
    /// Accepts both `--link-channel NAME` and `--link-channel=NAME`.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == CHANNEL_ARG {
                return args.next().map(Channel::named);
            }
            if let Some(name) = arg.strip_prefix(CHANNEL_ARG).and_then(|s| s.strip_prefix('=')) {
                return Some(Channel::named(name));
            }
        }
        None
    }
}

/// Clock-and-pid derived value for per-run channel uniqueness.
fn clock_mix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let pid = std::process::id() as u64;
    nanos.wrapping_mul(0x517c_c1b7_2722_0a95) ^ pid
}
