//! Error types for driver processes.

use std::io;

use glot_pool::DriverError;
use thiserror::Error;

/// Errors raised while running a driver process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The driver executable does not exist.
    #[error("driver binary not found: {program}")]
    BinaryNotFound {
        /// Program that was looked up.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The process could not be spawned.
    #[error("failed to spawn driver process: {message}")]
    SpawnFailed {
        /// What went wrong.
        message: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The stdio channel failed.
    #[error("driver channel error: {0}")]
    Framing(#[from] FramingError),

    /// A message could not be encoded or decoded.
    #[error("driver codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The driver answered with a JSON-RPC error.
    #[error("driver returned error: {message} (code: {code})")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Message reported by the driver.
        message: String,
    },

    /// The driver answered without a result.
    #[error("driver returned no result for {method}")]
    EmptyResult {
        /// Method that was called.
        method: String,
    },

    /// The driver kept sending unrelated messages.
    #[error("no response to request {request_id} after {messages} messages")]
    UnansweredRequest {
        /// Identifier of the unanswered request.
        request_id: i64,
        /// Messages read before giving up.
        messages: usize,
    },

    /// The process is not running.
    #[error("driver process is not running")]
    NotRunning,

    /// The process could not be killed.
    #[error("failed to terminate driver process")]
    Teardown(#[source] io::Error),
}

impl ProcessError {
    /// Returns `true` when the process can no longer be used.
    ///
    /// Only errors reported by the driver itself leave the process usable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Remote { .. } | Self::EmptyResult { .. })
    }
}

impl From<ProcessError> for DriverError {
    fn from(error: ProcessError) -> Self {
        let message = error.to_string();
        if error.is_fatal() {
            Self::fatal(message).with_source(error)
        } else {
            Self::recoverable(message).with_source(error)
        }
    }
}

/// Errors raised by the `Content-Length` framed channel.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Read or write failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream.
    #[error("driver closed the channel")]
    Closed,

    /// No `Content-Length` header preceded the payload.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// A header line could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The announced payload exceeds the frame limit.
    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Announced payload length.
        length: usize,
        /// Maximum accepted length.
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ProcessError::NotRunning, true)]
    #[case(ProcessError::Framing(FramingError::Closed), true)]
    #[case(ProcessError::Remote { code: -32000, message: "syntax error".to_owned() }, false)]
    #[case(ProcessError::EmptyResult { method: "parse".to_owned() }, false)]
    fn classifies_fatality(#[case] error: ProcessError, #[case] fatal: bool) {
        assert_eq!(error.is_fatal(), fatal);
        assert_eq!(DriverError::from(error).is_fatal(), fatal);
    }
}
