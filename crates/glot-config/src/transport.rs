//! Image transports understood by the driver runtime.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Strategy used to locate driver images.
///
/// The transport only affects how default image references are spelled.
/// Explicit per-language overrides bypass it entirely.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Transport {
    /// Registry-backed images, referenced as `docker://org/name:tag`.
    #[default]
    Docker,
    /// Images held by a local engine, referenced as `docker-daemon:org/name:tag`.
    DockerDaemon,
}

impl Transport {
    /// Returns the scheme prefix written before the image name.
    ///
    /// Registry references carry a `//` authority marker; local engine
    /// references do not.
    #[must_use]
    pub const fn reference_prefix(self) -> &'static str {
        match self {
            Self::Docker => "docker://",
            Self::DockerDaemon => "docker-daemon:",
        }
    }

    /// Builds the conventional image reference for a language driver.
    ///
    /// ```
    /// use glot_config::Transport;
    ///
    /// assert_eq!(
    ///     Transport::Docker.default_reference("python"),
    ///     "docker://bblfsh/python-driver:latest"
    /// );
    /// ```
    #[must_use]
    pub fn default_reference(self, language: &str) -> String {
        format!(
            "{}{}/{language}-driver:{}",
            self.reference_prefix(),
            crate::DEFAULT_IMAGE_ORGANISATION,
            crate::DEFAULT_IMAGE_TAG
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Transport::Docker, "docker://bblfsh/go-driver:latest")]
    #[case(Transport::DockerDaemon, "docker-daemon:bblfsh/go-driver:latest")]
    fn default_reference_follows_transport(#[case] transport: Transport, #[case] expected: &str) {
        assert_eq!(transport.default_reference("go"), expected);
    }

    #[rstest]
    #[case("docker", Transport::Docker)]
    #[case("Docker-Daemon", Transport::DockerDaemon)]
    fn parses_transport_names(#[case] input: &str, #[case] expected: Transport) {
        assert_eq!(Transport::from_str(input).expect("known transport"), expected);
    }

    #[rstest]
    fn rejects_unknown_transport() {
        assert!(Transport::from_str("oci-archive").is_err());
    }
}
