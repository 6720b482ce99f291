use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::env;
use std::thread;
use strum::{Display, EnumString};

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::socket::SocketEndpoint;

/// Default TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9432;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Organisation that publishes the stock language drivers.
pub const DEFAULT_IMAGE_ORGANISATION: &str = "bblfsh";

/// Tag used by default image references.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Time a request may wait for an idle driver instance.
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression used by the daemon.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Log output format shared by the daemon and the drivers it launches.
///
/// Drivers receive the same name, so only formats they understand exist.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    #[strum(to_string = "json")]
    Json,
    /// Single-line human-readable events.
    #[serde(alias = "compact")]
    #[strum(to_string = "text", serialize = "compact")]
    Text,
}

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default number of live instances kept per language.
///
/// Falls back to a single instance when the host parallelism is unknown.
#[must_use]
pub fn default_max_instances() -> usize {
    thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Directory holding installed driver images.
#[must_use]
pub fn default_drivers_dir() -> Utf8PathBuf {
    let base = dirs_data_directory().unwrap_or_else(fallback_base_directory);
    base.join("glot").join("drivers")
}

#[cfg(unix)]
fn dirs_data_directory() -> Option<Utf8PathBuf> {
    dirs::data_local_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn dirs_data_directory() -> Option<Utf8PathBuf> {
    None
}

/// Computes the default socket endpoint for the daemon.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("glot");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("glotd.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
