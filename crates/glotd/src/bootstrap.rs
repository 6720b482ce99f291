//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use glot_config::{Config, SocketDirectoryError};

use crate::daemon::{Daemon, DaemonSettings};
use crate::health::HealthReporter;
use crate::runtime::Runtime;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when configuration cannot be resolved.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketDirectoryError,
    },
}

/// Result of a successful bootstrap.
pub struct Bootstrapped {
    /// Resolved configuration.
    pub config: Config,
    /// Registry serving requests.
    pub daemon: Arc<Daemon>,
    /// Telemetry handle kept alive for the daemon's lifetime.
    pub telemetry: TelemetryHandle,
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// `runtime` builds the provisioning collaborator from the resolved
/// configuration.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration, telemetry, or socket
/// preparation fails. Each failure is also reported to `reporter`.
pub fn bootstrap_with<R>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    runtime: R,
) -> Result<Bootstrapped, BootstrapError>
where
    R: FnOnce(&Config) -> Arc<dyn Runtime>,
{
    reporter.bootstrap_starting();

    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })
        .inspect_err(|error| reporter.bootstrap_failed(error))?;

    let telemetry = telemetry::initialise(&config)
        .map_err(|source| BootstrapError::Telemetry { source })
        .inspect_err(|error| reporter.bootstrap_failed(error))?;

    config
        .daemon_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })
        .inspect_err(|error| reporter.bootstrap_failed(error))?;

    let settings = DaemonSettings::from_config(&config, env!("CARGO_PKG_VERSION"));
    let daemon = Daemon::with_reporter(settings, runtime(&config), Arc::clone(&reporter));
    reporter.bootstrap_succeeded(&config);

    Ok(Bootstrapped {
        config,
        daemon: Arc::new(daemon),
        telemetry,
    })
}
