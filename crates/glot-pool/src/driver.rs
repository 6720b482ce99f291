//! Contracts implemented by pooled driver handles.

use glot_protocol::{NativeParseRequest, NativeParseResponse, ParseRequest, ParseResponse};

use crate::errors::DriverError;

/// Parsing operations offered by a running driver.
pub trait DriverService {
    /// Parses content into the normalised tree representation.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the driver cannot be reached or rejects
    /// the request.
    fn parse(&mut self, request: &ParseRequest) -> Result<ParseResponse, DriverError>;

    /// Parses content into the driver's native tree representation.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the driver cannot be reached or rejects
    /// the request.
    fn native_parse(
        &mut self,
        request: &NativeParseRequest,
    ) -> Result<NativeParseResponse, DriverError>;
}

/// One isolated driver instance managed by a [`crate::DriverPool`].
pub trait PooledDriver: Send {
    /// Identity used in logs.
    fn id(&self) -> &str;

    /// Starts the underlying process.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the process fails to launch.
    fn start(&mut self) -> Result<(), DriverError>;

    /// Stops the underlying process.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when teardown fails.
    fn stop(&mut self) -> Result<(), DriverError>;

    /// Access to the parsing capability.
    fn service(&mut self) -> &mut dyn DriverService;
}

/// Constructs a new, not yet started, driver handle.
pub type DriverFactory =
    Box<dyn Fn() -> Result<Box<dyn PooledDriver>, DriverError> + Send + Sync + 'static>;
