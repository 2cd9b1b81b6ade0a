//! Cascade reclamation of test-created cloud resources.
//!
//! The reclaimer lists parent resources in an owner context, keeps those
//! whose name carries the test-artifact prefix, and for each one deletes every
//! child before deleting the parent. Each parent's sequence runs under its own
//! time budget and restarts from a fresh child listing on every retry, since
//! other actors may be mutating the same project.

mod cycle;
mod report;

use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::directory::{ApiError, Cascade, ParentResource, ResourceDirectory, ResourceKind};
use crate::retry::{Backoff, RetryPolicy};

pub use cycle::{CycleError, PassFailure};
pub use report::{CycleOutcome, CycleSummary, IncompleteReclaim, ReclaimReport};

/// Default per-parent time budget.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(300);

/// Name prefix carried by every resource the acceptance tests create.
pub const DEFAULT_TEST_PREFIX: &str = "terraform_testacc";

/// Scope and pacing of a reclamation run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReclaimConfig {
    /// Project to sweep; `None` turns the run into a logged no-op.
    pub owner_context: Option<String>,
    /// Only parents whose name starts with this prefix are touched.
    pub name_prefix: String,
    /// Wall-clock ceiling for each parent's deletion sequence.
    pub time_budget: Duration,
    /// Pacing between retries.
    pub backoff: Backoff,
    /// Number of parents reclaimed at once.
    pub concurrency: usize,
}

impl ReclaimConfig {
    /// Constructs a config with the default budget, backoff and sequential
    /// cycles. A blank owner context is normalised to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ReclaimError::InvalidConfig`] when the prefix is blank, since
    /// a blank prefix would match every resource in the project.
    pub fn new(
        owner_context: Option<String>,
        name_prefix: impl Into<String>,
    ) -> Result<Self, ReclaimError> {
        let trimmed_prefix = name_prefix.into().trim().to_owned();
        if trimmed_prefix.is_empty() {
            return Err(ReclaimError::InvalidConfig {
                field: String::from("name_prefix"),
            });
        }
        Ok(Self {
            owner_context: owner_context
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            name_prefix: trimmed_prefix,
            time_budget: DEFAULT_TIME_BUDGET,
            backoff: Backoff::default(),
            concurrency: 1,
        })
    }

    /// Replaces the per-parent time budget.
    ///
    /// # Errors
    ///
    /// Returns [`ReclaimError::InvalidConfig`] for a zero budget.
    pub fn with_time_budget(mut self, budget: Duration) -> Result<Self, ReclaimError> {
        if budget.is_zero() {
            return Err(ReclaimError::InvalidConfig {
                field: String::from("time_budget"),
            });
        }
        self.time_budget = budget;
        Ok(self)
    }

    /// Replaces the retry pacing.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets how many parents may be reclaimed at once (at least one).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            budget: self.time_budget,
            backoff: self.backoff.clone(),
        }
    }
}

/// Errors returned by [`Reclaimer::reclaim`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReclaimError {
    /// Raised when a configuration value is blank or out of range.
    #[error("invalid {field}")]
    InvalidConfig {
        /// Name of the rejected field.
        field: String,
    },
    /// Raised when the parent listing fails; nothing was deleted.
    #[error("error listing {kind} resources for project {owner_context}: {source}")]
    Discovery {
        /// Kind being listed.
        kind: ResourceKind,
        /// Project being swept.
        owner_context: String,
        /// Directory failure.
        #[source]
        source: ApiError,
    },
    /// Raised when at least one parent could not be reclaimed.
    #[error("{0}")]
    Incomplete(Box<IncompleteReclaim>),
}

/// Deletes prefixed parents and their children through a [`ResourceDirectory`].
#[derive(Clone, Debug)]
pub struct Reclaimer<D> {
    directory: D,
    cascade: Cascade,
}

impl<D: ResourceDirectory> Reclaimer<D> {
    /// Creates a reclaimer for the given parent/child pairing.
    #[must_use]
    pub const fn new(directory: D, cascade: Cascade) -> Self {
        Self { directory, cascade }
    }

    /// Parent/child pairing this reclaimer handles.
    #[must_use]
    pub const fn cascade(&self) -> Cascade {
        self.cascade
    }

    /// Runs a reclamation pass without external cancellation.
    ///
    /// # Errors
    ///
    /// See [`Reclaimer::reclaim_until_cancelled`].
    pub async fn reclaim(&self, config: &ReclaimConfig) -> Result<ReclaimReport, ReclaimError> {
        self.reclaim_until_cancelled(config, &CancellationToken::new())
            .await
    }

    /// Runs a reclamation pass that stops retrying once `cancel` fires.
    ///
    /// Each matched parent is reclaimed independently: a failure on one does
    /// not stop the others, and every outcome is recorded in listing order.
    ///
    /// # Errors
    ///
    /// Returns [`ReclaimError::Discovery`] when the parents cannot be listed
    /// and [`ReclaimError::Incomplete`] when any parent's cycle failed.
    pub async fn reclaim_until_cancelled(
        &self,
        config: &ReclaimConfig,
        cancel: &CancellationToken,
    ) -> Result<ReclaimReport, ReclaimError> {
        let Some(owner_context) = config.owner_context.as_deref() else {
            debug!(
                event = "sweep.reclaim.skipped",
                kind = %self.cascade.parent,
                "owner context is not set; nothing to sweep"
            );
            return Ok(ReclaimReport::skipped());
        };

        let parents = self
            .directory
            .list_parents(owner_context, self.cascade.parent)
            .await
            .map_err(|source| ReclaimError::Discovery {
                kind: self.cascade.parent,
                owner_context: owner_context.to_owned(),
                source,
            })?;

        let targets: Vec<ParentResource> = parents
            .into_iter()
            .filter(|parent| parent.matches_prefix(&config.name_prefix))
            .collect();
        debug!(
            event = "sweep.reclaim.discovered",
            kind = %self.cascade.parent,
            owner_context,
            matched = targets.len(),
            "listed reclaimable resources"
        );

        let retry_policy = config.retry_policy();
        let policy = &retry_policy;
        let outcomes: Vec<CycleOutcome> = stream::iter(targets)
            .map(|parent| async move {
                let result = self
                    .run_cycle(owner_context, &parent, policy, cancel)
                    .await;
                CycleOutcome { parent, result }
            })
            .buffered(config.concurrency.max(1))
            .collect()
            .await;

        let report = ReclaimReport {
            skipped: false,
            outcomes,
        };
        match report.first_failure().cloned() {
            None => Ok(report),
            Some(first) => {
                let failed = report.failed();
                warn!(
                    event = "sweep.reclaim.incomplete",
                    kind = %self.cascade.parent,
                    owner_context,
                    failed,
                    "some resources could not be reclaimed"
                );
                Err(ReclaimError::Incomplete(Box::new(IncompleteReclaim {
                    failed,
                    first,
                    report,
                })))
            }
        }
    }
}
