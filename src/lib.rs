//! # scenelink
//!
//! Typed command/query IPC link between a real-time scene/avatar engine
//! and its configuration GUI, running as separate processes.
//!
//! ## Architecture
//!
//! - **Wire**: binary frames over a duplex pipe (Unix domain socket /
//!   Windows named pipe), one channel name shared via command line
//! - **Commands**: fire-and-forget, possibly multicast, delivered FIFO
//! - **Queries**: correlated request/response, each resolving to one
//!   string result
//! - **Tick**: handlers run only when the owning process's main loop
//!   calls [`Dispatcher::tick`] - never on a transport thread
//! - **Batching**: bursts of setter commands coalesce into one frame
//!
//! ## Example
//!
//! ```ignore
//! use scenelink::{Dispatcher, Link};
//! use scenelink::codec::Value;
//! use scenelink::transport::Channel;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), scenelink::LinkError> {
//!     let mut dispatcher = Dispatcher::new(32);
//!     dispatcher.on_command(4, |v| {
//!         println!("shadow strength -> {:?}", v.as_percent());
//!     });
//!     dispatcher.on_query(7, |_| "2.4.1".to_string());
//!
//!     let channel = Channel::unique("scenelink");
//!     // spawn the GUI with channel.to_args() here
//!     let link = Link::builder(channel, dispatcher.inbox()).host().await?;
//!
//!     loop {
//!         dispatcher.tick(); // main loop, once per frame
//!         if link.is_closed() {
//!             break;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod correlate;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod schedule;
pub mod transport;

mod link;
mod writer;

pub use codec::{Value, ValueType, ValueView};
pub use config::LinkConfig;
pub use dispatch::{Dispatcher, Inbox};
pub use error::LinkError;
pub use link::{Link, LinkBuilder};
pub use schedule::{run_after, DelayedTask};
