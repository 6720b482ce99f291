//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use glot_config::Config;

use crate::bootstrap::BootstrapError;
use crate::errors::DaemonError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before a driver pool is registered.
    fn driver_installing(&self, language: &str, image: &str);

    /// Invoked after a driver pool is registered and running.
    fn driver_ready(&self, language: &str, image: &str);

    /// Invoked when registering a driver pool fails.
    fn driver_failed(&self, language: &str, error: &DaemonError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn driver_installing(&self, language: &str, image: &str) {
        (**self).driver_installing(language, image);
    }

    fn driver_ready(&self, language: &str, image: &str) {
        (**self).driver_ready(language, image);
    }

    fn driver_failed(&self, language: &str, error: &DaemonError) {
        (**self).driver_failed(language, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            transport = %config.transport(),
            drivers_dir = %config.drivers_dir(),
            max_instances = config.max_instances_per_driver(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn driver_installing(&self, language: &str, image: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "driver_installing",
            language,
            image,
            "installing driver"
        );
    }

    fn driver_ready(&self, language: &str, image: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "driver_ready",
            language,
            image,
            "driver ready"
        );
    }

    fn driver_failed(&self, language: &str, error: &DaemonError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "driver_failed",
            language,
            error = %error,
            "driver failed to install"
        );
    }
}
