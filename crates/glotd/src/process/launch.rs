//! Launch sequencing for the daemon binary.

use std::sync::Arc;

use tracing::info;

use glot_config::Config;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::runtime::{LocalRuntime, Runtime};
use crate::transport::{JsonlConnectionHandler, SocketListener};

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::PROCESS_TARGET;

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns a [`LaunchError`] when bootstrap, serving, or shutdown fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(&SystemConfigLoader, reporter, &SystemShutdownSignal, |config: &Config| {
        Arc::new(LocalRuntime::new(config.drivers_dir())) as Arc<dyn Runtime>
    })
}

/// Runs the daemon with injected collaborators.
///
/// Serves the configured socket until `shutdown` returns, then stops the
/// listener followed by every driver pool. Both are stopped even when an
/// earlier step fails, and the first failure is returned.
///
/// # Errors
///
/// Returns a [`LaunchError`] when bootstrap, serving, or shutdown fails.
pub fn run_daemon_with<R>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
    runtime: R,
) -> Result<(), LaunchError>
where
    R: FnOnce(&Config) -> Arc<dyn Runtime>,
{
    let bootstrapped = bootstrap_with(loader, reporter, runtime)?;
    let listener = SocketListener::bind(bootstrapped.config.daemon_socket())?;
    let handler = Arc::new(JsonlConnectionHandler::new(Arc::clone(&bootstrapped.daemon)));
    let listener_handle = listener.start(handler)?;
    info!(
        target: PROCESS_TARGET,
        socket = %bootstrapped.config.daemon_socket(),
        "daemon ready"
    );

    let waited = shutdown.wait().map_err(LaunchError::from);
    let listener_stopped = listener_handle.stop().map_err(LaunchError::from);
    let pools_stopped = bootstrapped.daemon.stop().map_err(LaunchError::Stop);
    waited.and(listener_stopped).and(pools_stopped)?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
