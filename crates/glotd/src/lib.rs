//! Parsing daemon that routes requests to per-language driver pools.
//!
//! A [`Daemon`] keeps one [`glot_pool::DriverPool`] per language and creates
//! each pool the first time a request for that language arrives. Requests
//! without a language are classified by [`detect`] before routing. Pools are
//! backed by driver images resolved through a [`Runtime`]; the production
//! [`LocalRuntime`] runs driver executables from an on-disk image tree.
//!
//! The binary serves newline-delimited JSON over the configured socket until
//! it receives a termination signal, then stops the listener and every pool.

mod bootstrap;
mod daemon;
mod detect;
mod dispatch;
mod errors;
mod health;
mod process;
pub mod runtime;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use daemon::{Daemon, DaemonSettings};
pub use detect::detect;
pub use errors::DaemonError;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon, run_daemon_with,
};
pub use runtime::{DriverImage, InstanceOptions, LocalRuntime, Runtime, RuntimeError};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
