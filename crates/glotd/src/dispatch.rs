//! Request entry points built on the registry.

use std::time::Instant;

use tracing::{debug, error, warn};

use glot_pool::{DriverError, PooledDriver};
use glot_protocol::{
    NativeParseRequest, NativeParseResponse, ParseRequest, ParseResponse, Reply, Request,
    Response, Status, VersionRequest, VersionResponse,
};

use crate::daemon::Daemon;
use crate::detect::detect;
use crate::errors::DaemonError;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Responses produced by a driver call.
trait DriverReply: Default {
    fn header(&self) -> &Response;
    fn header_mut(&mut self) -> &mut Response;
    fn language(&self) -> &str;
    fn set_language(&mut self, language: String);

    fn fatal(error: &dyn std::error::Error) -> Self {
        let mut reply = Self::default();
        *reply.header_mut() = Response::fatal(error);
        reply
    }
}

macro_rules! driver_reply {
    ($reply:ty) => {
        impl DriverReply for $reply {
            fn header(&self) -> &Response {
                &self.response
            }

            fn header_mut(&mut self) -> &mut Response {
                &mut self.response
            }

            fn language(&self) -> &str {
                &self.language
            }

            fn set_language(&mut self, language: String) {
                self.language = language;
            }
        }
    };
}

driver_reply!(ParseResponse);
driver_reply!(NativeParseResponse);

/// Fields shared by parse-style requests.
struct Source<'a> {
    operation: &'static str,
    filename: &'a str,
    language: &'a str,
    content: &'a str,
}

impl Daemon {
    /// Parses content into the normalised tree representation.
    ///
    /// Empty content yields a default response without contacting any
    /// driver. Every request yields exactly one response whose `elapsed`
    /// covers the whole call; failures are reported as [`Status::Fatal`].
    #[must_use]
    pub fn parse(&self, request: &ParseRequest) -> ParseResponse {
        let source = Source {
            operation: ParseRequest::OPERATION,
            filename: &request.filename,
            language: &request.language,
            content: &request.content,
        };
        self.serve(&source, |language, driver| {
            let resolved = ParseRequest {
                language: language.to_owned(),
                ..request.clone()
            };
            driver.service().parse(&resolved)
        })
    }

    /// Parses content into the driver's native tree representation.
    ///
    /// Behaves like [`parse`](Self::parse) apart from the driver operation.
    #[must_use]
    pub fn native_parse(&self, request: &NativeParseRequest) -> NativeParseResponse {
        let source = Source {
            operation: NativeParseRequest::OPERATION,
            filename: &request.filename,
            language: &request.language,
            content: &request.content,
        };
        self.serve(&source, |language, driver| {
            let resolved = NativeParseRequest {
                language: language.to_owned(),
                ..request.clone()
            };
            driver.service().native_parse(&resolved)
        })
    }

    /// Reports the configured version string.
    #[must_use]
    pub fn version(&self, _request: &VersionRequest) -> VersionResponse {
        VersionResponse {
            response: Response::default(),
            version: self.settings().version.clone(),
        }
    }

    /// Serves one decoded request envelope.
    #[must_use]
    pub fn handle(&self, request: &Request) -> Reply {
        match request {
            Request::Parse(parse) => Reply::Parse(self.parse(parse)),
            Request::NativeParse(native) => Reply::NativeParse(self.native_parse(native)),
            Request::Version(version) => Reply::Version(self.version(version)),
        }
    }

    fn serve<T, F>(&self, source: &Source<'_>, call: F) -> T
    where
        T: DriverReply,
        F: FnOnce(&str, &mut dyn PooledDriver) -> Result<T, DriverError>,
    {
        let started = Instant::now();
        let (mut reply, language) = if source.content.is_empty() {
            (T::default(), source.language.to_owned())
        } else {
            let language = if source.language.is_empty() {
                detect(source.filename, source.content)
            } else {
                source.language.to_owned()
            };
            let reply = match self.driver_pool(&language) {
                Ok(pool) => pool
                    .execute(|driver| call(&language, driver))
                    .unwrap_or_else(|error| T::fatal(&error)),
                Err(error) => T::fatal(&DaemonError::unexpected(error)),
            };
            (reply, language)
        };

        reply.header_mut().elapsed = started.elapsed();
        if reply.language().is_empty() {
            reply.set_language(language);
        }
        log_response(
            source.operation,
            reply.language(),
            source.content.len(),
            reply.header(),
        );
        reply
    }
}

fn log_response(operation: &str, language: &str, size: usize, response: &Response) {
    let elapsed_ms = u64::try_from(response.elapsed.as_millis()).unwrap_or(u64::MAX);
    match response.status {
        Status::Ok => debug!(
            target: DISPATCH_TARGET,
            operation,
            language,
            size,
            elapsed_ms,
            status = %response.status,
            "request served"
        ),
        Status::Error => warn!(
            target: DISPATCH_TARGET,
            operation,
            language,
            size,
            elapsed_ms,
            status = %response.status,
            errors = ?response.errors,
            "request served with errors"
        ),
        Status::Fatal => error!(
            target: DISPATCH_TARGET,
            operation,
            language,
            size,
            elapsed_ms,
            status = %response.status,
            errors = ?response.errors,
            "request failed"
        ),
    }
}
