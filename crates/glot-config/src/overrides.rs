//! Per-language driver image overrides.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing [`DriverOverride`] values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverOverrideParseError {
    /// The `=` separator between language and image was missing.
    #[error("override '{0}' is missing the '=' separator")]
    MissingSeparator(String),
    /// The language part was empty.
    #[error("override '{0}' does not name a language")]
    MissingLanguage(String),
    /// The image reference part was empty.
    #[error("override '{0}' does not name an image reference")]
    MissingImage(String),
}

/// Explicit image reference used for one language instead of the default.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DriverOverride {
    /// Language identifier such as `python`.
    pub language: String,
    /// Image reference, for example `docker-daemon:acme/python-driver:dev`.
    pub image: String,
}

impl DriverOverride {
    /// Creates a new override.
    #[must_use]
    pub fn new(language: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            image: image.into(),
        }
    }
}

impl fmt::Display for DriverOverride {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}={}", self.language, self.image)
    }
}

impl FromStr for DriverOverride {
    type Err = DriverOverrideParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (language, image) = input
            .split_once('=')
            .ok_or_else(|| DriverOverrideParseError::MissingSeparator(input.to_owned()))?;
        let language = language.trim();
        let image = image.trim();
        if language.is_empty() {
            return Err(DriverOverrideParseError::MissingLanguage(input.to_owned()));
        }
        if image.is_empty() {
            return Err(DriverOverrideParseError::MissingImage(input.to_owned()));
        }
        Ok(Self::new(normalise_language(language), image))
    }
}

/// Collapses override directives into a map keyed by language.
///
/// Later directives for the same language replace earlier ones, so the highest
/// precedence configuration layer wins once the layers have been appended.
#[must_use]
pub fn override_map<'a, I>(overrides: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a DriverOverride>,
{
    overrides
        .into_iter()
        .map(|entry| (normalise_language(&entry.language), entry.image.clone()))
        .collect()
}

fn normalise_language(language: &str) -> String {
    language.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn parses_language_and_image() {
        let parsed: DriverOverride = " Python = docker-daemon:acme/python-driver:dev"
            .parse()
            .expect("valid override");

        assert_eq!(parsed.language, "python");
        assert_eq!(parsed.image, "docker-daemon:acme/python-driver:dev");
    }

    #[rstest]
    #[case("python", DriverOverrideParseError::MissingSeparator(String::from("python")))]
    #[case("=img", DriverOverrideParseError::MissingLanguage(String::from("=img")))]
    #[case("go=", DriverOverrideParseError::MissingImage(String::from("go=")))]
    fn rejects_malformed_overrides(#[case] input: &str, #[case] expected: DriverOverrideParseError) {
        assert_eq!(input.parse::<DriverOverride>(), Err(expected));
    }

    #[rstest]
    fn later_overrides_win() {
        let overrides = vec![
            DriverOverride::new("go", "docker://acme/go-driver:v1"),
            DriverOverride::new("Go", "docker://acme/go-driver:v2"),
        ];

        let map = override_map(&overrides);

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get("go").map(String::as_str),
            Some("docker://acme/go-driver:v2")
        );
    }
}
