//! Bounded, lazily provisioned pool of driver handles.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::driver::{DriverFactory, PooledDriver};
use crate::errors::{DriverError, PoolError};

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

/// Snapshot of a pool's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    /// Language served by the pool.
    pub language: String,
    /// Maximum number of live handles.
    pub capacity: usize,
    /// Handles that exist, including those being provisioned.
    pub live: usize,
    /// Handles waiting in the idle set.
    pub idle: usize,
    /// Handles lent out or being provisioned.
    pub in_use: usize,
    /// Callers queued for a handle.
    pub waiting: usize,
    /// Whether the pool accepts work.
    pub running: bool,
}

#[derive(Default)]
struct PoolState {
    running: bool,
    idle: VecDeque<Box<dyn PooledDriver>>,
    live: usize,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
}

/// A queued caller. Returned handles and freed slots go to the oldest
/// waiter without a grant, never back to the idle set while one exists.
struct Waiter {
    ticket: u64,
    grant: Option<Grant>,
}

enum Grant {
    /// A healthy handle passed over by `release`.
    Handle(Box<dyn PooledDriver>),
    /// A slot already counted in `live`, to be provisioned by the waiter.
    Slot,
}

impl PoolState {
    fn enqueue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.waiters.push_back(Waiter {
            ticket,
            grant: None,
        });
        ticket
    }

    fn next_ungranted(&mut self) -> Option<&mut Waiter> {
        self.waiters.iter_mut().find(|waiter| waiter.grant.is_none())
    }

    /// Removes the waiter for `ticket` if it has been granted something.
    fn claim(&mut self, ticket: u64) -> Option<Grant> {
        let position = self
            .waiters
            .iter()
            .position(|waiter| waiter.ticket == ticket && waiter.grant.is_some())?;
        self.waiters.remove(position)?.grant
    }

    fn leave(&mut self, ticket: u64) {
        self.waiters.retain(|waiter| waiter.ticket != ticket);
    }
}

/// Owns the driver handles for a single language.
///
/// Handles move between the idle set and exactly one in-flight
/// [`execute`](Self::execute) call. The pool provisions a new handle whenever
/// none is idle and fewer than `capacity` exist; otherwise callers queue for
/// up to the acquire timeout and are served in arrival order.
pub struct DriverPool {
    language: String,
    capacity: usize,
    acquire_timeout: Duration,
    factory: DriverFactory,
    state: Mutex<PoolState>,
    returned: Condvar,
    lifecycle: Mutex<()>,
}

impl DriverPool {
    /// Creates a stopped pool.
    ///
    /// A `capacity` of zero is raised to one.
    #[must_use]
    pub fn new(
        language: impl Into<String>,
        capacity: usize,
        acquire_timeout: Duration,
        factory: DriverFactory,
    ) -> Self {
        Self {
            language: language.into(),
            capacity: capacity.max(1),
            acquire_timeout,
            factory,
            state: Mutex::new(PoolState::default()),
            returned: Condvar::new(),
            lifecycle: Mutex::new(()),
        }
    }

    /// Language served by this pool.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Starts the pool and provisions its first handle.
    ///
    /// A stopped pool may be started again. If the pool still holds handles
    /// from before it was stopped, those are reused instead of provisioning.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyStarted`] when the pool is running and
    /// [`PoolError::Provision`] when the initial handle cannot be started. A
    /// failed start leaves the pool stopped.
    pub fn start(&self) -> Result<(), PoolError> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut state = self.lock_state();
            if state.running {
                return Err(PoolError::AlreadyStarted {
                    language: self.language.clone(),
                });
            }
            if state.live > 0 {
                state.running = true;
                info!(target: POOL_TARGET, language = %self.language, live = state.live, "driver pool restarted");
                return Ok(());
            }
            state.live = 1;
        }

        let driver = match self.spawn() {
            Ok(driver) => driver,
            Err(source) => {
                self.forfeit_slot();
                return Err(PoolError::Provision {
                    language: self.language.clone(),
                    source,
                });
            }
        };

        let mut state = self.lock_state();
        state.idle.push_back(driver);
        state.running = true;
        self.returned.notify_all();
        info!(target: POOL_TARGET, language = %self.language, capacity = self.capacity, "driver pool started");
        Ok(())
    }

    /// Runs `work` with exclusive use of one handle, waiting up to the
    /// configured acquire timeout.
    ///
    /// # Errors
    ///
    /// See [`execute_with_timeout`](Self::execute_with_timeout).
    pub fn execute<T, F>(&self, work: F) -> Result<T, PoolError>
    where
        F: FnOnce(&mut dyn PooledDriver) -> Result<T, DriverError>,
    {
        self.execute_with_timeout(self.acquire_timeout, work)
    }

    /// Runs `work` with exclusive use of one handle, waiting at most `timeout`
    /// for a handle to become available.
    ///
    /// The handle is returned to the idle set once `work` completes, unless
    /// `work` fails with a fatal [`DriverError`] or panics, in which case the
    /// handle is torn down and its slot freed for a replacement.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotStarted`] for a stopped pool,
    /// [`PoolError::Timeout`] when no handle frees up in time,
    /// [`PoolError::Provision`] when a new handle cannot be started, and
    /// [`PoolError::Driver`] carrying the error returned by `work`.
    pub fn execute_with_timeout<T, F>(&self, timeout: Duration, work: F) -> Result<T, PoolError>
    where
        F: FnOnce(&mut dyn PooledDriver) -> Result<T, DriverError>,
    {
        let mut driver = self.acquire(timeout)?;
        let checkout = Checkout::new(self);
        let outcome = work(&mut *driver);
        checkout.complete();

        let healthy = outcome.as_ref().err().is_none_or(|error| !error.is_fatal());
        if !healthy {
            warn!(
                target: POOL_TARGET,
                language = %self.language,
                instance = driver.id(),
                "evicting driver after fatal error"
            );
        }
        self.release(driver, healthy);
        outcome.map_err(PoolError::Driver)
    }

    /// Stops the pool and tears down every idle handle.
    ///
    /// Handles lent out at the time of the call are torn down when their
    /// callers return them. Stopping a stopped pool is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stop`] carrying the first teardown failure after
    /// attempting to stop every handle.
    pub fn stop(&self) -> Result<(), PoolError> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let drained: Vec<_> = {
            let mut state = self.lock_state();
            if !state.running {
                return Ok(());
            }
            state.running = false;
            let mut drained: Vec<_> = state.idle.drain(..).collect();
            let mut revoked_slots = 0_usize;
            for waiter in &mut state.waiters {
                match waiter.grant.take() {
                    Some(Grant::Handle(driver)) => drained.push(driver),
                    Some(Grant::Slot) => revoked_slots += 1,
                    None => {}
                }
            }
            state.live = state
                .live
                .saturating_sub(drained.len())
                .saturating_sub(revoked_slots);
            self.returned.notify_all();
            drained
        };

        let mut failures = 0_usize;
        let mut first = None;
        for mut driver in drained {
            if let Err(error) = driver.stop() {
                warn!(
                    target: POOL_TARGET,
                    language = %self.language,
                    instance = driver.id(),
                    error = %error,
                    "driver failed to stop"
                );
                failures += 1;
                first.get_or_insert(error);
            }
        }
        info!(target: POOL_TARGET, language = %self.language, failures, "driver pool stopped");

        match first {
            None => Ok(()),
            Some(source) => Err(PoolError::Stop {
                language: self.language.clone(),
                failures,
                source,
            }),
        }
    }

    /// Returns a snapshot of the pool's bookkeeping.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.lock_state();
        PoolStatus {
            language: self.language.clone(),
            capacity: self.capacity,
            live: state.live,
            idle: state.idle.len(),
            in_use: state.live.saturating_sub(state.idle.len()),
            waiting: state.waiters.len(),
            running: state.running,
        }
    }

    fn acquire(&self, timeout: Duration) -> Result<Box<dyn PooledDriver>, PoolError> {
        let started = Instant::now();
        let mut state = self.lock_state();
        if !state.running {
            return Err(self.not_started());
        }
        if let Some(driver) = state.idle.pop_front() {
            return Ok(driver);
        }
        if state.live < self.capacity {
            state.live += 1;
            drop(state);
            return self.provision_reserved();
        }

        let ticket = state.enqueue();
        loop {
            if let Some(grant) = state.claim(ticket) {
                drop(state);
                return match grant {
                    Grant::Handle(driver) => Ok(driver),
                    Grant::Slot => self.provision_reserved(),
                };
            }
            if !state.running {
                state.leave(ticket);
                return Err(self.not_started());
            }

            let waited = started.elapsed();
            let Some(remaining) = timeout.checked_sub(waited).filter(|left| !left.is_zero()) else {
                state.leave(ticket);
                return Err(PoolError::Timeout {
                    language: self.language.clone(),
                    waited,
                });
            };
            let (guard, _) = self
                .returned
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Provisions a handle into a slot already counted in `live`.
    fn provision_reserved(&self) -> Result<Box<dyn PooledDriver>, PoolError> {
        let mut driver = match self.spawn() {
            Ok(driver) => driver,
            Err(source) => {
                self.forfeit_slot();
                return Err(PoolError::Provision {
                    language: self.language.clone(),
                    source,
                });
            }
        };

        if self.lock_state().running {
            return Ok(driver);
        }
        self.forfeit_slot();
        Self::teardown(&self.language, &mut *driver);
        Err(self.not_started())
    }

    fn spawn(&self) -> Result<Box<dyn PooledDriver>, DriverError> {
        let mut driver = (self.factory)()?;
        driver.start()?;
        debug!(target: POOL_TARGET, language = %self.language, instance = driver.id(), "driver provisioned");
        Ok(driver)
    }

    fn release(&self, mut driver: Box<dyn PooledDriver>, healthy: bool) {
        {
            let mut state = self.lock_state();
            if healthy && state.running {
                let Some(waiter) = state.next_ungranted() else {
                    state.idle.push_back(driver);
                    return;
                };
                waiter.grant = Some(Grant::Handle(driver));
                self.returned.notify_all();
                return;
            }
            state.live = state.live.saturating_sub(1);
            self.grant_slot(&mut state);
        }
        Self::teardown(&self.language, &mut *driver);
    }

    fn forfeit_slot(&self) {
        let mut state = self.lock_state();
        state.live = state.live.saturating_sub(1);
        self.grant_slot(&mut state);
    }

    /// Passes a free slot to the oldest ungranted waiter.
    fn grant_slot(&self, state: &mut PoolState) {
        if !state.running || state.live >= self.capacity {
            return;
        }
        let Some(waiter) = state.next_ungranted() else {
            return;
        };
        waiter.grant = Some(Grant::Slot);
        state.live += 1;
        self.returned.notify_all();
    }

    fn teardown(language: &str, driver: &mut dyn PooledDriver) {
        if let Err(error) = driver.stop() {
            warn!(
                target: POOL_TARGET,
                language,
                instance = driver.id(),
                error = %error,
                "driver failed to stop"
            );
        }
    }

    fn not_started(&self) -> PoolError {
        PoolError::NotStarted {
            language: self.language.clone(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DriverPool {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DriverPool")
            .field("language", &self.language)
            .field("capacity", &self.capacity)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish_non_exhaustive()
    }
}

/// Frees the slot of a lent-out handle if the work callback unwinds.
struct Checkout<'pool> {
    pool: &'pool DriverPool,
    armed: bool,
}

impl<'pool> Checkout<'pool> {
    const fn new(pool: &'pool DriverPool) -> Self {
        Self { pool, armed: true }
    }

    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.forfeit_slot();
        }
    }
}
