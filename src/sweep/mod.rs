//! Named sweepers run across regions.
//!
//! A [`SweeperRegistry`] maps names to cascades. The [`SweepCoordinator`]
//! runs the registered sweepers for each requested region, building one
//! directory per region through a caller-supplied factory.

use std::fmt;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::directory::{Cascade, ResourceDirectory};
use crate::reclaim::{ReclaimConfig, ReclaimError, ReclaimReport, Reclaimer};

/// Name of the sweeper reclaiming private networks and their subnets.
pub const PRIVATE_NETWORK_SWEEPER: &str = "ovh_cloud_network_private";

/// A named cascade.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sweeper {
    /// Name used for selection with `--sweep-run`.
    pub name: String,
    /// Parent/child pairing the sweeper reclaims.
    pub cascade: Cascade,
}

impl Sweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(name: impl Into<String>, cascade: Cascade) -> Self {
        Self {
            name: name.into(),
            cascade,
        }
    }

    fn matches(&self, filter: &[String]) -> bool {
        if filter.is_empty() {
            return true;
        }
        let name = self.name.to_lowercase();
        filter
            .iter()
            .map(|term| term.trim().to_lowercase())
            .any(|term| !term.is_empty() && name.contains(&term))
    }
}

/// Ordered set of sweepers with unique names.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SweeperRegistry {
    sweepers: Vec<Sweeper>,
}

impl SweeperRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every sweeper this crate ships.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            sweepers: vec![Sweeper::new(PRIVATE_NETWORK_SWEEPER, Cascade::PRIVATE_NETWORK)],
        }
    }

    /// Adds a sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::DuplicateSweeper`] when the name is taken.
    pub fn register(&mut self, sweeper: Sweeper) -> Result<(), SweepError> {
        if self.sweepers.iter().any(|known| known.name == sweeper.name) {
            return Err(SweepError::DuplicateSweeper { name: sweeper.name });
        }
        self.sweepers.push(sweeper);
        Ok(())
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.sweepers.iter().map(|sweeper| sweeper.name.as_str()).collect()
    }

    /// Sweepers whose name contains any filter term, ignoring case. An empty
    /// filter selects everything.
    #[must_use]
    pub fn matching(&self, filter: &[String]) -> Vec<&Sweeper> {
        self.sweepers
            .iter()
            .filter(|sweeper| sweeper.matches(filter))
            .collect()
    }
}

/// Result of one sweeper in one region.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SweepRecord {
    /// Region the sweeper ran against.
    pub region: String,
    /// Sweeper name.
    pub sweeper: String,
    /// Reclamation report, or why it failed.
    pub result: Result<ReclaimReport, ReclaimError>,
}

impl SweepRecord {
    /// Whether the sweeper finished without failures.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Errors raised by [`SweepCoordinator::run`] and the registry.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SweepError {
    /// Raised when no region was requested.
    #[error("no regions to sweep; pass at least one region")]
    NoRegions,
    /// Raised when the name filter selects no sweeper.
    #[error("no sweepers match {filter:?}; known sweepers: {known}")]
    NoMatchingSweepers {
        /// Filter terms as supplied.
        filter: Vec<String>,
        /// Comma-separated registered names.
        known: String,
    },
    /// Raised when a sweeper name is registered twice.
    #[error("sweeper {name} is already registered")]
    DuplicateSweeper {
        /// Conflicting name.
        name: String,
    },
    /// Raised on the first failed sweeper when failures are not allowed.
    #[error("sweeper {sweeper} failed in region {region}: {source}")]
    SweeperFailed {
        /// Region being swept.
        region: String,
        /// Sweeper that failed.
        sweeper: String,
        /// Underlying failure.
        #[source]
        source: Box<ReclaimError>,
    },
    /// Raised when the directory for a region cannot be built.
    #[error("failed to build client for region {region}: {message}")]
    Client {
        /// Region being swept.
        region: String,
        /// Error reported by the directory factory.
        message: String,
    },
}

/// Runs registered sweepers across regions.
#[derive(Debug)]
pub struct SweepCoordinator<F> {
    registry: SweeperRegistry,
    config: ReclaimConfig,
    directory_for: F,
    allow_failures: bool,
    cancel: CancellationToken,
}

impl<F, D, E> SweepCoordinator<F>
where
    F: Fn(&str) -> Result<D, E>,
    D: ResourceDirectory + Clone,
    E: fmt::Display,
{
    /// Creates a coordinator that stops at the first failed sweeper.
    #[must_use]
    pub fn new(registry: SweeperRegistry, config: ReclaimConfig, directory_for: F) -> Self {
        Self {
            registry,
            config,
            directory_for,
            allow_failures: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Keeps running after a sweeper fails.
    #[must_use]
    pub const fn allow_failures(mut self, allow: bool) -> Self {
        self.allow_failures = allow;
        self
    }

    /// Token that stops in-flight retries when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every sweeper selected by `filter` in every region, in order.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::NoRegions`] or [`SweepError::NoMatchingSweepers`]
    /// before any call is made, [`SweepError::Client`] when a region's
    /// directory cannot be built, and [`SweepError::SweeperFailed`] on the
    /// first failure unless failures are allowed.
    pub async fn run(
        &self,
        regions: &[String],
        filter: &[String],
    ) -> Result<Vec<SweepRecord>, SweepError> {
        let region_names: Vec<&str> = regions
            .iter()
            .map(|region| region.trim())
            .filter(|region| !region.is_empty())
            .collect();
        if region_names.is_empty() {
            return Err(SweepError::NoRegions);
        }
        let sweepers = self.registry.matching(filter);
        if sweepers.is_empty() {
            return Err(SweepError::NoMatchingSweepers {
                filter: filter.to_vec(),
                known: self.registry.names().join(", "),
            });
        }

        let mut records = Vec::with_capacity(region_names.len().saturating_mul(sweepers.len()));
        for region in region_names {
            let directory =
                (self.directory_for)(region).map_err(|err| SweepError::Client {
                    region: region.to_owned(),
                    message: err.to_string(),
                })?;
            for sweeper in &sweepers {
                info!(
                    event = "sweep.run.start",
                    region,
                    sweeper = %sweeper.name,
                    "running sweeper"
                );
                let reclaimer = Reclaimer::new(directory.clone(), sweeper.cascade);
                let result = reclaimer
                    .reclaim_until_cancelled(&self.config, &self.cancel)
                    .await;
                if let Err(err) = &result {
                    warn!(
                        event = "sweep.run.failed",
                        region,
                        sweeper = %sweeper.name,
                        error = %err,
                        "sweeper failed"
                    );
                    if !self.allow_failures {
                        return Err(SweepError::SweeperFailed {
                            region: region.to_owned(),
                            sweeper: sweeper.name.clone(),
                            source: Box::new(err.clone()),
                        });
                    }
                }
                records.push(SweepRecord {
                    region: region.to_owned(),
                    sweeper: sweeper.name.clone(),
                    result,
                });
            }
        }
        Ok(records)
    }
}
