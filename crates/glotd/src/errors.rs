//! Error taxonomy for the daemon registry.

use thiserror::Error;

use glot_pool::PoolError;

use crate::runtime::RuntimeError;

/// Errors surfaced by [`crate::Daemon`].
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A failure occurred while selecting a pool for a request.
    #[error("unexpected error: {source}")]
    Unexpected {
        /// Underlying selection failure.
        #[source]
        source: Box<DaemonError>,
    },
    /// No pool could be obtained for the language.
    #[error("missing driver for language {language:?}")]
    MissingDriver {
        /// Requested language.
        language: String,
        /// Why registration failed, when it was attempted.
        #[source]
        source: Option<Box<DaemonError>>,
    },
    /// Resolving, installing, or starting a driver failed.
    #[error("runtime failure for {language} driver {image}: {source}")]
    Runtime {
        /// Language being registered.
        language: String,
        /// Image reference being registered.
        image: String,
        /// Underlying runtime failure.
        #[source]
        source: RuntimeError,
    },
    /// A pool is already registered for the language.
    #[error("driver for language {language} is already installed (image reference {image})")]
    AlreadyInstalled {
        /// Registered language.
        language: String,
        /// Image reference of the rejected registration.
        image: String,
    },
    /// A registered pool failed to stop cleanly.
    #[error("failed to stop {language} driver pool: {source}")]
    Stop {
        /// Language of the failing pool.
        language: String,
        /// Underlying pool failure.
        #[source]
        source: PoolError,
    },
}

impl DaemonError {
    /// Returns `true` for the idempotency guard raised by a duplicate
    /// registration.
    #[must_use]
    pub const fn is_already_installed(&self) -> bool {
        matches!(self, Self::AlreadyInstalled { .. })
    }

    pub(crate) fn unexpected(source: Self) -> Self {
        Self::Unexpected {
            source: Box::new(source),
        }
    }
}
