//! Driver handles backed by child processes.
//!
//! A [`ProcessDriver`] spawns a parser driver executable and talks JSON-RPC
//! 2.0 to it over stdio, using `Content-Length` framing. It implements the
//! pool contracts from `glot-pool`, so the daemon can lend it out through a
//! `DriverPool`.

mod command;
mod error;
mod framing;
mod jsonrpc;
mod lifecycle;
mod process;
mod rpc;

pub use command::DriverCommand;
pub use error::{FramingError, ProcessError};
pub use framing::FramedChannel;
pub use process::{ProcessDriver, instance_id};

const DRIVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
