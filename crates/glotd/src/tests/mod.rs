//! Test suites for the parsing daemon.

pub(crate) mod support;
