//! Error types for driver handles and pools.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by a driver handle.
///
/// A fatal error means the underlying process can no longer be trusted and
/// the handle must not be reused.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
    fatal: bool,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl DriverError {
    /// Builds an error after which the handle remains usable.
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
            source: None,
        }
    }

    /// Builds an error that invalidates the handle.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns `true` when the handle that produced this error must be evicted.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.fatal
    }
}

/// Failure reported by a [`crate::DriverPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool is stopped.
    #[error("driver pool for {language} is not started")]
    NotStarted {
        /// Language served by the pool.
        language: String,
    },
    /// `start` was called on a running pool.
    #[error("driver pool for {language} is already started")]
    AlreadyStarted {
        /// Language served by the pool.
        language: String,
    },
    /// A new handle could not be constructed or started.
    #[error("failed to provision {language} driver: {source}")]
    Provision {
        /// Language served by the pool.
        language: String,
        /// Factory or start failure.
        #[source]
        source: DriverError,
    },
    /// No handle became available before the deadline.
    #[error("timed out after {waited:?} waiting for an idle {language} driver")]
    Timeout {
        /// Language served by the pool.
        language: String,
        /// How long the caller waited.
        waited: Duration,
    },
    /// The work run against a handle failed.
    #[error(transparent)]
    Driver(DriverError),
    /// One or more handles failed to stop.
    #[error("failed to stop {failures} {language} driver(s): {source}")]
    Stop {
        /// Language served by the pool.
        language: String,
        /// Number of handles whose teardown failed.
        failures: usize,
        /// First teardown failure.
        #[source]
        source: DriverError,
    },
}

impl PoolError {
    /// Returns the driver error produced by the work callback, if any.
    #[must_use]
    pub const fn as_driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver(error) => Some(error),
            _ => None,
        }
    }
}
