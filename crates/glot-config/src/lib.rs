//! Shared configuration for the glot parsing daemon.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then a
//! `glot.toml` file, then `GLOT_*` environment variables, then command-line
//! flags. The resolved [`Config`] decides where the daemon listens, which
//! transport default driver images are fetched through, which languages use
//! an explicit image instead, and how large each per-language pool may grow.

mod defaults;
mod overrides;
mod socket;
mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_IMAGE_ORGANISATION, DEFAULT_IMAGE_TAG, DEFAULT_LOG_FILTER,
    DEFAULT_TCP_PORT, LogFormat, default_drivers_dir, default_log_filter, default_log_filter_string,
    default_log_format, default_max_instances, default_socket_endpoint,
};
pub use overrides::{DriverOverride, DriverOverrideParseError, override_map};
pub use socket::{SocketDirectoryError, SocketEndpoint, SocketParseError};
pub use transport::Transport;

/// Resolved daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "GLOT",
    discovery(
        app_name = "glot",
        env_var = "GLOT_CONFIG_PATH",
        config_file_name = "glot.toml",
        dotfile_name = ".glot.toml",
        config_cli_long = "config-path",
        config_cli_visible = true
    )
)]
pub struct Config {
    /// Socket the daemon listens on.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// Transport used to spell default driver image references.
    #[ortho_config(default = Transport::Docker)]
    pub transport: Transport,
    /// Explicit `language=image` directives, appended across layers.
    #[ortho_config(merge_strategy = "append")]
    #[serde(default)]
    pub driver_overrides: Vec<DriverOverride>,
    /// Root directory containing installed driver images.
    #[ortho_config(default = default_drivers_dir())]
    pub drivers_dir: Utf8PathBuf,
    /// Upper bound on live driver instances per language.
    #[ortho_config(default = default_max_instances())]
    pub max_instances_per_driver: usize,
    /// Milliseconds a request may wait for an idle driver instance.
    #[ortho_config(default = DEFAULT_ACQUIRE_TIMEOUT_MS)]
    pub acquire_timeout_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            transport: Transport::default(),
            driver_overrides: Vec::new(),
            drivers_dir: default_drivers_dir(),
            max_instances_per_driver: default_max_instances(),
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the aggregated [`OrthoError`] when any layer fails to parse.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration using an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns the aggregated [`OrthoError`] when any layer fails to parse.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Socket the daemon listens on.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Transport used for default image references.
    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Per-language image overrides with the last directive per language kept.
    #[must_use]
    pub fn overrides(&self) -> BTreeMap<String, String> {
        override_map(&self.driver_overrides)
    }

    /// Root directory containing installed driver images.
    #[must_use]
    pub fn drivers_dir(&self) -> &Utf8Path {
        self.drivers_dir.as_path()
    }

    /// Pool capacity, never less than one.
    #[must_use]
    pub fn max_instances_per_driver(&self) -> usize {
        self.max_instances_per_driver.max(1)
    }

    /// Time a request may wait for an idle driver instance.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format for structured logs.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
