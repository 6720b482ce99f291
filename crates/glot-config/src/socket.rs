//! Address the daemon listens on.
//!
//! Endpoints are written as URLs in every configuration layer:
//! `unix:///run/glot/glotd.sock` or `tcp://127.0.0.1:9432`. A TCP address
//! without a port listens on [`DEFAULT_TCP_PORT`].

use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::defaults::DEFAULT_TCP_PORT;

/// Daemon listening address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum SocketEndpoint {
    /// Unix domain socket at `path`.
    Unix {
        /// Filesystem path of the socket.
        path: Utf8PathBuf,
    },
    /// TCP listener on `host:port`.
    Tcp {
        /// Host name or address to bind.
        host: String,
        /// Port to bind.
        port: u16,
    },
}

impl SocketEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Creates the directory that will hold a Unix socket, readable only by
    /// the daemon's user. TCP endpoints and sockets in the working directory
    /// need nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SocketDirectoryError`] when the directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketDirectoryError> {
        let Self::Unix { path } = self else {
            return Ok(());
        };
        let Some(directory) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Ok(());
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        std::os::unix::fs::DirBuilderExt::mode(&mut builder, 0o700);

        builder
            .create(directory)
            .or_else(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => Ok(()),
                _ => Err(source),
            })
            .map_err(|source| SocketDirectoryError {
                directory: directory.to_path_buf(),
                source,
            })
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &'static str| SocketParseError {
            input: input.to_owned(),
            reason,
        };
        let url = Url::parse(input).map_err(|_| malformed("not a URL"))?;

        match url.scheme() {
            "unix" if url.path().is_empty() || url.path() == "/" => {
                Err(malformed("unix endpoints need a socket path"))
            }
            "unix" => Ok(Self::unix(url.path())),
            "tcp" => {
                let host = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| malformed("tcp endpoints need a host"))?;
                Ok(Self::tcp(host, url.port().unwrap_or(DEFAULT_TCP_PORT)))
            }
            _ => Err(malformed("scheme must be unix or tcp")),
        }
    }
}

impl TryFrom<String> for SocketEndpoint {
    type Error = SocketParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SocketEndpoint> for String {
    fn from(endpoint: SocketEndpoint) -> Self {
        endpoint.to_string()
    }
}

/// Text that does not name a daemon socket.
#[derive(Debug, Error)]
#[error("invalid daemon socket '{input}': {reason}")]
pub struct SocketParseError {
    input: String,
    reason: &'static str,
}

/// The directory for a Unix socket could not be created.
#[derive(Debug, Error)]
#[error("cannot create socket directory {directory}: {source}")]
pub struct SocketDirectoryError {
    directory: Utf8PathBuf,
    #[source]
    source: io::Error,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("unix:///run/glot/glotd.sock", SocketEndpoint::unix("/run/glot/glotd.sock"))]
    #[case("tcp://0.0.0.0:9000", SocketEndpoint::tcp("0.0.0.0", 9000))]
    #[case("tcp://localhost", SocketEndpoint::tcp("localhost", DEFAULT_TCP_PORT))]
    fn parses_daemon_addresses(#[case] input: &str, #[case] expected: SocketEndpoint) {
        assert_eq!(input.parse::<SocketEndpoint>().expect("valid endpoint"), expected);
    }

    #[rstest]
    #[case("udp://127.0.0.1:9432", "scheme must be unix or tcp")]
    #[case("unix://", "unix endpoints need a socket path")]
    #[case("/run/glotd.sock", "not a URL")]
    fn rejects_other_addresses(#[case] input: &str, #[case] reason: &str) {
        let error = input.parse::<SocketEndpoint>().expect_err("invalid endpoint");
        assert_eq!(error.to_string(), format!("invalid daemon socket '{input}': {reason}"));
    }

    #[rstest]
    fn serialises_as_its_url() {
        let endpoint = SocketEndpoint::unix("/tmp/glotd.sock");
        let encoded = serde_json::to_string(&endpoint).expect("encode");
        assert_eq!(encoded, r#""unix:///tmp/glotd.sock""#);
        let decoded: SocketEndpoint = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, endpoint);
    }

    #[rstest]
    fn creates_missing_socket_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("glotd.sock");
        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));

        endpoint.prepare_filesystem().expect("prepare socket directory");
        endpoint.prepare_filesystem().expect("existing directory is fine");

        assert!(dir.path().join("nested").is_dir());
    }

    #[rstest]
    fn bare_socket_name_needs_no_directory() {
        SocketEndpoint::unix("glotd.sock")
            .prepare_filesystem()
            .expect("working directory socket");
    }
}
