//! Dispatch module - handler tables, queues, and the tick discipline.
//!
//! Provides:
//! - [`Dispatcher`] - owns the handler tables and FIFO queues; its
//!   `tick()` is the only place handlers execute
//! - [`Inbox`] - clonable, thread-safe producer handle
//! - [`HandlerTable`] - dense id-indexed multicast/single-slot arrays
//!
//! # Example
//!
//! ```
//! use scenelink::dispatch::Dispatcher;
//! use scenelink::codec::Value;
//!
//! let mut dispatcher = Dispatcher::new(32);
//! dispatcher.on_command(4, |v| {
//!     println!("shadow strength now {:?}", v.as_percent());
//! });
//! dispatcher.on_query(7, |_| "ready".to_string());
//!
//! // Owner thread, once per frame:
//! dispatcher.tick();
//! ```

mod dispatcher;
mod table;

pub use dispatcher::{Dispatcher, Inbox};
pub use table::{CommandHandler, HandlerTable, QueryHandler};
