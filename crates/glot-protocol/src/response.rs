//! Response payloads and the shared status header.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome classification carried by every response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The request completed.
    #[default]
    Ok,
    /// The driver reported a recoverable problem, such as a syntax error.
    Error,
    /// The request could not be served.
    Fatal,
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        formatter.write_str(label)
    }
}

/// Header shared by all responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Response {
    /// Outcome of the request.
    #[serde(default)]
    pub status: Status,
    /// Human-readable error messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Time spent serving the request.
    #[serde(default)]
    pub elapsed: Duration,
}

impl Response {
    /// Builds a fatal header from an error's display text.
    #[must_use]
    pub fn fatal(error: &dyn std::error::Error) -> Self {
        Self {
            status: Status::Fatal,
            errors: vec![error.to_string()],
            elapsed: Duration::ZERO,
        }
    }

    /// Builds a fatal header from a plain message.
    #[must_use]
    pub fn fatal_message(message: impl Into<String>) -> Self {
        Self {
            status: Status::Fatal,
            errors: vec![message.into()],
            elapsed: Duration::ZERO,
        }
    }
}

/// Normalised parse result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ParseResponse {
    /// Status header.
    #[serde(flatten)]
    pub response: Response,
    /// Language the content was parsed as.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    /// Normalised tree produced by the driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uast: Option<Value>,
}

/// Native parse result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NativeParseResponse {
    /// Status header.
    #[serde(flatten)]
    pub response: Response,
    /// Language the content was parsed as.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    /// Tree in the driver's native representation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<Value>,
}

/// Daemon version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionResponse {
    /// Status header.
    #[serde(flatten)]
    pub response: Response,
    /// Version string configured at construction.
    pub version: String,
}

/// Envelope written back on the daemon socket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    /// Reply to a parse request.
    Parse(ParseResponse),
    /// Reply to a native parse request.
    NativeParse(NativeParseResponse),
    /// Reply to a version request.
    Version(VersionResponse),
    /// Reply to a line that could not be decoded.
    Invalid(Response),
}

impl Reply {
    /// Status header of the wrapped response.
    #[must_use]
    pub const fn response(&self) -> &Response {
        match self {
            Self::Parse(reply) => &reply.response,
            Self::NativeParse(reply) => &reply.response,
            Self::Version(reply) => &reply.response,
            Self::Invalid(response) => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn default_response_is_ok_without_errors() {
        let response = ParseResponse::default();

        assert_eq!(response.response.status, Status::Ok);
        assert!(response.response.errors.is_empty());
        assert!(response.uast.is_none());
    }

    #[rstest]
    fn status_header_flattens_into_reply() {
        let reply = Reply::Parse(ParseResponse {
            response: Response::fatal_message("missing driver for language cobol"),
            ..ParseResponse::default()
        });

        let value = serde_json::to_value(&reply).expect("serialise reply");

        assert_eq!(value["kind"], json!("parse"));
        assert_eq!(value["status"], json!("fatal"));
        assert_eq!(value["errors"], json!(["missing driver for language cobol"]));
    }

    #[rstest]
    #[case(Status::Ok, "ok")]
    #[case(Status::Error, "error")]
    #[case(Status::Fatal, "fatal")]
    fn status_labels(#[case] status: Status, #[case] expected: &str) {
        assert_eq!(status.to_string(), expected);
    }

    #[rstest]
    fn driver_response_deserialises_without_elapsed() {
        let response: ParseResponse = serde_json::from_value(json!({
            "status": "error",
            "errors": ["unexpected token"],
            "uast": {"type": "File"}
        }))
        .expect("driver response");

        assert_eq!(response.response.status, Status::Error);
        assert_eq!(response.response.elapsed, Duration::ZERO);
        assert_eq!(response.uast, Some(json!({"type": "File"})));
    }
}
