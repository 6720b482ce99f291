//! Parsed driver image references.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use glot_config::{DEFAULT_IMAGE_TAG, Transport};

/// Errors raised while parsing an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// The reference does not start with a known transport prefix.
    #[error("unknown transport in image reference {reference:?}")]
    UnknownTransport {
        /// Offending reference.
        reference: String,
    },
    /// The reference lacks an `org/name` pair.
    #[error("image reference {reference:?} must name an image as org/name[:tag]")]
    MissingName {
        /// Offending reference.
        reference: String,
    },
    /// A component contains characters outside `[a-z0-9._-]`.
    #[error("image reference {reference:?} contains invalid component {component:?}")]
    InvalidComponent {
        /// Offending reference.
        reference: String,
        /// Offending component.
        component: String,
    },
}

/// A concrete, transport-qualified driver image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriverImage {
    transport: Transport,
    organisation: String,
    name: String,
    tag: String,
}

impl DriverImage {
    /// Transport the image was referenced through.
    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.transport
    }

    /// Organisation part of the name.
    #[must_use]
    pub fn organisation(&self) -> &str {
        &self.organisation
    }

    /// Repository part of the name.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.name
    }

    /// Image tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns `org/name:tag`, the transport-independent image name.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}/{}:{}", self.organisation, self.name, self.tag)
    }
}

impl fmt::Display for DriverImage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}{}", self.transport.reference_prefix(), self.name())
    }
}

impl FromStr for DriverImage {
    type Err = ImageError;

    fn from_str(reference: &str) -> Result<Self, Self::Err> {
        let reference = reference.trim();
        let (transport, rest) = [Transport::Docker, Transport::DockerDaemon]
            .into_iter()
            .find_map(|transport| {
                reference
                    .strip_prefix(transport.reference_prefix())
                    .map(|rest| (transport, rest))
            })
            .ok_or_else(|| ImageError::UnknownTransport {
                reference: reference.to_owned(),
            })?;

        let missing_name = || ImageError::MissingName {
            reference: reference.to_owned(),
        };
        let (organisation, tagged) = rest.rsplit_once('/').ok_or_else(missing_name)?;
        let (name, tag) = tagged.split_once(':').unwrap_or((tagged, DEFAULT_IMAGE_TAG));
        if organisation.is_empty() || name.is_empty() || tag.is_empty() {
            return Err(missing_name());
        }

        for component in organisation.split('/').chain([name, tag]) {
            if !is_valid_component(component) {
                return Err(ImageError::InvalidComponent {
                    reference: reference.to_owned(),
                    component: component.to_owned(),
                });
            }
        }

        Ok(Self {
            transport,
            organisation: organisation.to_owned(),
            name: name.to_owned(),
            tag: tag.to_owned(),
        })
    }
}

fn is_valid_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && component
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-'))
}
