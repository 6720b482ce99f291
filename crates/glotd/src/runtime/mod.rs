//! Provisioning collaborator that resolves, installs, and instantiates
//! driver images.

mod image;
mod local;

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use glot_config::{Config, LogFormat};
use glot_pool::{DriverError, PooledDriver, PoolError};

pub use self::image::{DriverImage, ImageError};
pub use self::local::LocalRuntime;

/// Environment variable carrying the driver log level.
pub const DRIVER_LOG_LEVEL_ENV: &str = "GLOT_DRIVER_LOG_LEVEL";
/// Environment variable carrying the driver log format.
pub const DRIVER_LOG_FORMAT_ENV: &str = "GLOT_DRIVER_LOG_FORMAT";

/// Settings forwarded to every driver instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOptions {
    /// Log level or filter handed to the driver.
    pub log_level: String,
    /// Log format handed to the driver.
    pub log_format: LogFormat,
}

impl InstanceOptions {
    /// Mirrors the daemon's own logging configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            log_level: config.log_filter().to_owned(),
            log_format: config.log_format(),
        }
    }
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            log_level: glot_config::default_log_filter_string(),
            log_format: LogFormat::default(),
        }
    }
}

/// Errors raised by a [`Runtime`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The image reference could not be parsed.
    #[error(transparent)]
    Image(#[from] ImageError),
    /// The image is not available locally.
    #[error("driver image {image} is not installed (expected {path})")]
    NotInstalled {
        /// Image name.
        image: String,
        /// Expected executable path.
        path: Utf8PathBuf,
    },
    /// Inspecting the install location failed.
    #[error("failed to inspect {path}: {source}")]
    Inspect {
        /// Path being inspected.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The pool for the image failed to start.
    #[error("failed to start driver pool: {0}")]
    Start(#[source] PoolError),
}

/// Resolves image references and builds driver instances from them.
#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    /// Parses an image reference into a concrete image.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Image`] for malformed references.
    fn resolve_image(&self, reference: &str) -> Result<DriverImage, RuntimeError>;

    /// Makes `image` available, re-installing it when `force` is set.
    ///
    /// # Errors
    ///
    /// Returns a [`RuntimeError`] when the image cannot be installed.
    fn install_driver(&self, image: &DriverImage, force: bool) -> Result<(), RuntimeError>;

    /// Builds a new, not yet started, driver instance for `image`.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the instance cannot be constructed.
    fn new_instance(
        &self,
        language: &str,
        image: &DriverImage,
        options: &InstanceOptions,
    ) -> Result<Box<dyn PooledDriver>, DriverError>;
}
