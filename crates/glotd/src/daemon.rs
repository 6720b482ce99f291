//! Registry owning one driver pool per language.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use glot_config::{Config, Transport};
use glot_pool::{DriverFactory, DriverPool, PoolStatus};

use crate::errors::DaemonError;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::runtime::{DriverImage, InstanceOptions, Runtime, RuntimeError};

pub(crate) const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

/// Construction-time settings for a [`Daemon`].
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    /// Version reported by [`Daemon::version`].
    pub version: String,
    /// Transport used to spell default image references.
    pub transport: Transport,
    /// Per-language image references that bypass the default convention.
    pub overrides: BTreeMap<String, String>,
    /// Maximum live handles per language pool.
    pub max_instances_per_driver: usize,
    /// How long a request may wait for an idle handle.
    pub acquire_timeout: Duration,
    /// Settings forwarded to every driver instance.
    pub instance_options: InstanceOptions,
}

impl DaemonSettings {
    /// Derives settings from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            transport: config.transport(),
            overrides: config.overrides(),
            max_instances_per_driver: config.max_instances_per_driver(),
            acquire_timeout: config.acquire_timeout(),
            instance_options: InstanceOptions::from_config(config),
        }
    }
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            transport: Transport::default(),
            overrides: BTreeMap::new(),
            max_instances_per_driver: glot_config::default_max_instances(),
            acquire_timeout: Duration::from_millis(glot_config::DEFAULT_ACQUIRE_TIMEOUT_MS),
            instance_options: InstanceOptions::default(),
        }
    }
}

/// Routes requests to per-language driver pools, creating each pool on
/// first use.
///
/// Lookups share a read lock. Registration holds the write lock for the
/// whole resolve, install, construct, and start sequence, so readers never
/// observe a pool that has not started.
pub struct Daemon {
    settings: DaemonSettings,
    runtime: Arc<dyn Runtime>,
    reporter: Arc<dyn HealthReporter>,
    pools: RwLock<HashMap<String, Arc<DriverPool>>>,
}

impl Daemon {
    /// Creates a daemon with no registered pools.
    #[must_use]
    pub fn new(settings: DaemonSettings, runtime: Arc<dyn Runtime>) -> Self {
        Self::with_reporter(settings, runtime, Arc::new(StructuredHealthReporter::new()))
    }

    /// Creates a daemon that reports driver lifecycle events to `reporter`.
    #[must_use]
    pub fn with_reporter(
        settings: DaemonSettings,
        runtime: Arc<dyn Runtime>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            settings,
            runtime,
            reporter,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Settings the daemon was built with.
    #[must_use]
    pub const fn settings(&self) -> &DaemonSettings {
        &self.settings
    }

    /// Registers and starts a pool for `language` backed by `image`.
    ///
    /// Nothing is published unless the image resolves, installs, and the
    /// pool starts.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::AlreadyInstalled`] when a pool exists for the
    /// language and [`DaemonError::Runtime`] when provisioning fails.
    pub fn add_driver(&self, language: &str, image: &str) -> Result<(), DaemonError> {
        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        if pools.contains_key(language) {
            return Err(DaemonError::AlreadyInstalled {
                language: language.to_owned(),
                image: image.to_owned(),
            });
        }

        self.reporter.driver_installing(language, image);
        let runtime_failure = |source| DaemonError::Runtime {
            language: language.to_owned(),
            image: image.to_owned(),
            source,
        };
        let pool = self
            .install(language, image)
            .map_err(runtime_failure)
            .inspect_err(|error| self.reporter.driver_failed(language, error))?;

        pools.insert(language.to_owned(), Arc::new(pool));
        self.reporter.driver_ready(language, image);
        Ok(())
    }

    fn install(&self, language: &str, reference: &str) -> Result<DriverPool, RuntimeError> {
        let image = self.runtime.resolve_image(reference)?;
        self.runtime.install_driver(&image, false)?;

        let pool = DriverPool::new(
            language,
            self.settings.max_instances_per_driver,
            self.settings.acquire_timeout,
            self.factory(language, image),
        );
        pool.start().map_err(RuntimeError::Start)?;
        Ok(pool)
    }

    fn factory(&self, language: &str, image: DriverImage) -> DriverFactory {
        let runtime = Arc::clone(&self.runtime);
        let language = language.to_owned();
        let options = self.settings.instance_options.clone();
        Box::new(move || runtime.new_instance(&language, &image, &options))
    }

    /// Returns the pool for `language`, registering it on first use.
    ///
    /// Concurrent first-time callers provision the pool once; callers that
    /// lose the registration race receive the winner's pool.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::MissingDriver`] when no pool can be obtained.
    pub fn driver_pool(&self, language: &str) -> Result<Arc<DriverPool>, DaemonError> {
        if let Some(pool) = self.lookup(language) {
            return Ok(pool);
        }
        if language.is_empty() {
            return Err(DaemonError::MissingDriver {
                language: String::new(),
                source: None,
            });
        }

        let image = self.default_image_reference(language);
        match self.add_driver(language, &image) {
            Ok(()) => {}
            Err(error) if error.is_already_installed() => {
                debug!(target: DAEMON_TARGET, language, "driver registered concurrently");
            }
            Err(error) => {
                return Err(DaemonError::MissingDriver {
                    language: language.to_owned(),
                    source: Some(Box::new(error)),
                });
            }
        }

        self.lookup(language)
            .ok_or_else(|| DaemonError::MissingDriver {
                language: language.to_owned(),
                source: None,
            })
    }

    fn lookup(&self, language: &str) -> Option<Arc<DriverPool>> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(language)
            .cloned()
    }

    /// Image reference used when `language` is registered on demand.
    ///
    /// A configured override wins; otherwise the transport's naming
    /// convention applies.
    #[must_use]
    pub fn default_image_reference(&self, language: &str) -> String {
        self.settings
            .overrides
            .get(language)
            .cloned()
            .unwrap_or_else(|| self.settings.transport.default_reference(language))
    }

    /// Languages with a registered pool, sorted.
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let mut languages: Vec<_> = pools.keys().cloned().collect();
        languages.sort();
        languages
    }

    /// Status of every registered pool, sorted by language.
    #[must_use]
    pub fn pools(&self) -> Vec<PoolStatus> {
        let mut statuses: Vec<_> = self.snapshot().iter().map(|pool| pool.status()).collect();
        statuses.sort_by(|left, right| left.language.cmp(&right.language));
        statuses
    }

    /// Stops every registered pool.
    ///
    /// Every pool is attempted even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`DaemonError::Stop`] encountered.
    pub fn stop(&self) -> Result<(), DaemonError> {
        let mut first = None;
        for pool in self.snapshot() {
            if let Err(source) = pool.stop() {
                warn!(
                    target: DAEMON_TARGET,
                    language = pool.language(),
                    error = %source,
                    "driver pool failed to stop"
                );
                first.get_or_insert(DaemonError::Stop {
                    language: pool.language().to_owned(),
                    source,
                });
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn snapshot(&self) -> Vec<Arc<DriverPool>> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Daemon")
            .field("settings", &self.settings)
            .field("languages", &self.languages())
            .finish_non_exhaustive()
    }
}
