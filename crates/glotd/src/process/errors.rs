use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::errors::DaemonError;
use crate::transport::ListenerError;

use super::ShutdownError;

/// Errors that abort a daemon run.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed before the listener was bound.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The socket listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// Waiting for a shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// Driver pools did not stop cleanly.
    #[error("failed to stop driver pools: {0}")]
    Stop(#[source] DaemonError),
}
