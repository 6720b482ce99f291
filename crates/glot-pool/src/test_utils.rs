//! Scripted driver handles for pool tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use glot_protocol::{NativeParseRequest, NativeParseResponse, ParseRequest, ParseResponse};

use crate::{DriverError, DriverFactory, DriverService, PooledDriver};

/// Shared counters observed by every driver a factory produces.
#[derive(Debug, Default)]
pub(crate) struct DriverLedger {
    pub(crate) provisioned: AtomicUsize,
    pub(crate) stopped: AtomicUsize,
    pub(crate) fail_start: AtomicBool,
    pub(crate) fail_stop: AtomicBool,
    /// Delay applied when starting every driver after the first.
    pub(crate) later_start_delay_ms: AtomicU64,
}

impl DriverLedger {
    pub(crate) fn provisioned(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub(crate) fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedDriver {
    id: String,
    sequence: usize,
    ledger: Arc<DriverLedger>,
}

impl PooledDriver for ScriptedDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self) -> Result<(), DriverError> {
        if self.ledger.fail_start.load(Ordering::SeqCst) {
            return Err(DriverError::fatal("driver binary refused to start"));
        }
        let delay = self.ledger.later_start_delay_ms.load(Ordering::SeqCst);
        if self.sequence > 1 && delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.ledger.stopped.fetch_add(1, Ordering::SeqCst);
        if self.ledger.fail_stop.load(Ordering::SeqCst) {
            return Err(DriverError::fatal(format!("{} ignored shutdown", self.id)));
        }
        Ok(())
    }

    fn service(&mut self) -> &mut dyn DriverService {
        self
    }
}

impl DriverService for ScriptedDriver {
    fn parse(&mut self, request: &ParseRequest) -> Result<ParseResponse, DriverError> {
        Ok(ParseResponse {
            language: request.language.clone(),
            ..ParseResponse::default()
        })
    }

    fn native_parse(
        &mut self,
        request: &NativeParseRequest,
    ) -> Result<NativeParseResponse, DriverError> {
        Ok(NativeParseResponse {
            language: request.language.clone(),
            ..NativeParseResponse::default()
        })
    }
}

pub(crate) fn scripted_factory(ledger: &Arc<DriverLedger>) -> DriverFactory {
    let ledger = Arc::clone(ledger);
    Box::new(move || {
        let sequence = ledger.provisioned.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(ScriptedDriver {
            id: format!("scripted-{sequence}"),
            sequence,
            ledger: Arc::clone(&ledger),
        }) as Box<dyn PooledDriver>)
    })
}
