//! Request payloads.

use serde::{Deserialize, Serialize};

/// Request for a normalised parse tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParseRequest {
    /// Name of the file the content came from; used for language detection.
    #[serde(default)]
    pub filename: String,
    /// Language identifier. Empty means "detect from filename and content".
    #[serde(default)]
    pub language: String,
    /// Source code to parse.
    #[serde(default)]
    pub content: String,
}

/// Request for the driver's native parse tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NativeParseRequest {
    /// Name of the file the content came from; used for language detection.
    #[serde(default)]
    pub filename: String,
    /// Language identifier. Empty means "detect from filename and content".
    #[serde(default)]
    pub language: String,
    /// Source code to parse.
    #[serde(default)]
    pub content: String,
}

/// Request for the daemon version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionRequest {}

impl ParseRequest {
    /// Envelope `kind` of this request.
    pub const OPERATION: &'static str = "parse";
}

impl NativeParseRequest {
    /// Envelope `kind` of this request.
    pub const OPERATION: &'static str = "native_parse";
}

impl VersionRequest {
    /// Envelope `kind` of this request.
    pub const OPERATION: &'static str = "version";
}

/// Envelope accepted on the daemon socket.
///
/// ```json
/// {"kind":"parse","filename":"main.py","content":"x = 1"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    /// Normalised parse.
    Parse(ParseRequest),
    /// Native parse.
    NativeParse(NativeParseRequest),
    /// Version query.
    Version(VersionRequest),
}

impl Request {
    /// Envelope `kind`, used as the operation label in logs.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Parse(_) => ParseRequest::OPERATION,
            Self::NativeParse(_) => NativeParseRequest::OPERATION,
            Self::Version(_) => VersionRequest::OPERATION,
        }
    }
}
