//! Bounded pools of parser driver processes.
//!
//! A [`DriverPool`] owns the live driver handles for a single language. Handles
//! are provisioned lazily through a [`DriverFactory`] up to the pool capacity
//! and are lent out to one caller at a time through [`DriverPool::execute`].
//! The pool never exposes the same handle to two concurrent callers; a handle
//! whose work fails with a fatal [`DriverError`] is torn down and replaced on
//! the next demand.

mod driver;
mod errors;
mod pool;
#[cfg(test)]
mod test_utils;

pub use driver::{DriverFactory, DriverService, PooledDriver};
pub use errors::{DriverError, PoolError};
pub use pool::{DriverPool, PoolStatus};
