//! Socket listener and JSONL connection handling.
//!
//! The listener binds the configured endpoint and accepts connections on a
//! background thread, handing each one to a [`ConnectionHandler`] on its own
//! thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream, JsonlConnectionHandler};
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
