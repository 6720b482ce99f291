//! Shared fakes for daemon tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glot_pool::{DriverError, DriverService, PooledDriver};
use glot_protocol::{NativeParseRequest, NativeParseResponse, ParseRequest, ParseResponse};

use crate::bootstrap::BootstrapError;
use crate::daemon::{Daemon, DaemonSettings};
use crate::errors::DaemonError;
use crate::health::HealthReporter;
use crate::runtime::{DriverImage, MockRuntime};

/// How a [`FakeDriver`] answers parse calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    /// Echo the request back as a tree.
    Echo,
    /// Fail the call without killing the handle.
    Reject,
    /// Fail the call and the handle.
    Crash,
}

/// In-memory driver handle.
pub(crate) struct FakeDriver {
    id: String,
    behaviour: Behaviour,
    stops: Arc<AtomicUsize>,
    fail_stop: bool,
}

impl FakeDriver {
    fn answer(&self) -> Result<(), DriverError> {
        std::thread::sleep(Duration::from_millis(1));
        match self.behaviour {
            Behaviour::Echo => Ok(()),
            Behaviour::Reject => Err(DriverError::recoverable("driver rejected content")),
            Behaviour::Crash => Err(DriverError::fatal("driver exited")),
        }
    }
}

impl DriverService for FakeDriver {
    fn parse(&mut self, request: &ParseRequest) -> Result<ParseResponse, DriverError> {
        self.answer()?;
        Ok(ParseResponse {
            uast: Some(serde_json::json!({
                "language": request.language,
                "content": request.content,
            })),
            ..ParseResponse::default()
        })
    }

    fn native_parse(
        &mut self,
        request: &NativeParseRequest,
    ) -> Result<NativeParseResponse, DriverError> {
        self.answer()?;
        Ok(NativeParseResponse {
            language: request.language.clone(),
            ast: Some(serde_json::json!({ "native": request.content })),
            ..NativeParseResponse::default()
        })
    }
}

impl PooledDriver for FakeDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(DriverError::fatal("stop failed"));
        }
        Ok(())
    }

    fn service(&mut self) -> &mut dyn DriverService {
        self
    }
}

/// Knobs for [`fake_runtime`].
#[derive(Debug, Clone)]
pub(crate) struct FakeRuntime {
    pub behaviour: Behaviour,
    pub install_delay: Duration,
    pub fail_install: bool,
    pub fail_stop: bool,
    pub stops: Arc<AtomicUsize>,
    pub references: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            behaviour: Behaviour::Echo,
            install_delay: Duration::ZERO,
            fail_install: false,
            fail_stop: false,
            stops: Arc::new(AtomicUsize::new(0)),
            references: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeRuntime {
    /// Builds a mock whose installs are expected `installs` times.
    pub(crate) fn mock(&self, installs: usize) -> MockRuntime {
        let mut runtime = MockRuntime::new();

        let references = Arc::clone(&self.references);
        runtime.expect_resolve_image().returning(move |reference| {
            references
                .lock()
                .expect("references lock")
                .push(reference.to_owned());
            Ok(reference.parse::<DriverImage>()?)
        });

        let delay = self.install_delay;
        let fail = self.fail_install;
        runtime
            .expect_install_driver()
            .times(installs)
            .returning(move |image, _force| {
                std::thread::sleep(delay);
                if fail {
                    return Err(crate::runtime::RuntimeError::NotInstalled {
                        image: image.name(),
                        path: "/nonexistent/bin/driver".into(),
                    });
                }
                Ok(())
            });

        let behaviour = self.behaviour;
        let stops = Arc::clone(&self.stops);
        let fail_stop = self.fail_stop;
        let sequence = Arc::new(AtomicUsize::new(0));
        runtime
            .expect_new_instance()
            .returning(move |language, _image, _options| {
                let n = sequence.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Box::new(FakeDriver {
                    id: format!("{language}-fake-{n}"),
                    behaviour,
                    stops: Arc::clone(&stops),
                    fail_stop,
                }) as Box<dyn PooledDriver>)
            });
        runtime
    }

    /// Builds a daemon over [`mock`](Self::mock).
    pub(crate) fn daemon(&self, settings: DaemonSettings, installs: usize) -> Arc<Daemon> {
        Arc::new(Daemon::new(settings, Arc::new(self.mock(installs))))
    }

    /// Image references resolved so far.
    pub(crate) fn references(&self) -> Vec<String> {
        self.references.lock().expect("references lock").clone()
    }
}

/// Daemon whose runtime must never be touched.
pub(crate) fn daemon_with_version(version: &str) -> Arc<Daemon> {
    let mut runtime = MockRuntime::new();
    runtime.expect_resolve_image().times(0);
    runtime.expect_install_driver().times(0);
    runtime.expect_new_instance().times(0);
    let settings = DaemonSettings {
        version: version.to_owned(),
        ..DaemonSettings::default()
    };
    Arc::new(Daemon::new(settings, Arc::new(runtime)))
}

/// Health reporter that records driver events.
#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingHealthReporter {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    fn record(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record("bootstrap_starting".to_owned());
    }

    fn bootstrap_succeeded(&self, _config: &glot_config::Config) {
        self.record("bootstrap_succeeded".to_owned());
    }

    fn bootstrap_failed(&self, _error: &BootstrapError) {
        self.record("bootstrap_failed".to_owned());
    }

    fn driver_installing(&self, language: &str, _image: &str) {
        self.record(format!("installing:{language}"));
    }

    fn driver_ready(&self, language: &str, _image: &str) {
        self.record(format!("ready:{language}"));
    }

    fn driver_failed(&self, language: &str, _error: &DaemonError) {
        self.record(format!("failed:{language}"));
    }
}
