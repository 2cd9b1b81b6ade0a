//! One parent's cascade-delete cycle.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::directory::{
    ApiError, ChildResource, ErrorClass, ParentResource, ResourceDirectory, ResourceRef,
};
use crate::retry::{
    AbortCause, Attempt, RetryError, RetryOutcome, RetryPolicy, retry_within_budget,
};

use super::{CycleSummary, Reclaimer};

/// Directory failure tied to the resource it concerned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PassFailure {
    /// Resource being listed or deleted.
    pub target: ResourceRef,
    /// Error returned by the directory.
    pub error: ApiError,
}

impl fmt::Display for PassFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

impl PassFailure {
    fn into_attempt(self, class: ErrorClass) -> Attempt<Self> {
        match class {
            ErrorClass::Retryable => Attempt::Retryable(self),
            ErrorClass::Terminal | ErrorClass::NotFound => Attempt::Terminal(self),
        }
    }
}

/// Failure of a single parent's cycle.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CycleError {
    /// A request failed in a way waiting cannot fix.
    #[error("terminal failure after {attempts} attempt(s) on {failure}")]
    Terminal {
        /// Resource and error that aborted the cycle.
        failure: PassFailure,
        /// Attempts made, including the failing one.
        attempts: u32,
    },
    /// Only retryable errors occurred but the cycle ran out of time or was
    /// cancelled.
    #[error("{cause} while reclaiming {parent} after {attempts} attempt(s); last error: {}", describe_last(.last_failure.as_ref()))]
    BudgetExhausted {
        /// Parent whose cycle was abandoned.
        parent: ResourceRef,
        /// Deadline or cancellation.
        cause: AbortCause,
        /// Attempts made.
        attempts: u32,
        /// Most recent retryable failure, if any attempt ran.
        last_failure: Option<PassFailure>,
    },
}

fn describe_last(failure: Option<&PassFailure>) -> String {
    failure.map_or_else(|| String::from("none"), ToString::to_string)
}

impl<D: ResourceDirectory> Reclaimer<D> {
    pub(super) async fn run_cycle(
        &self,
        owner_context: &str,
        parent: &ParentResource,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<CycleSummary, CycleError> {
        debug!(
            event = "sweep.cycle.found",
            owner_context,
            parent_id = %parent.id,
            name = %parent.name,
            "found dangling {} and its children",
            self.cascade.parent
        );

        let deleted_children = AtomicUsize::new(0);
        let result = retry_within_budget(policy, cancel, || {
            self.cascade_pass(owner_context, parent, &deleted_children)
        })
        .await;

        match result {
            Ok(RetryOutcome {
                value: parent_deleted,
                attempts,
            }) => {
                let summary = CycleSummary {
                    deleted_children: deleted_children.load(Ordering::SeqCst),
                    attempts,
                    parent_deleted,
                };
                info!(
                    event = "sweep.cycle.complete",
                    owner_context,
                    parent_id = %parent.id,
                    deleted_children = summary.deleted_children,
                    attempts,
                    parent_deleted,
                    "successful cascade delete of {}",
                    self.cascade.parent
                );
                Ok(summary)
            }
            Err(RetryError::Terminal { error, attempts }) => {
                warn!(
                    event = "sweep.cycle.terminal",
                    owner_context,
                    parent_id = %parent.id,
                    attempts,
                    error = %error,
                    "cascade delete aborted"
                );
                Err(CycleError::Terminal {
                    failure: error,
                    attempts,
                })
            }
            Err(RetryError::Aborted {
                cause,
                attempts,
                last_error,
            }) => {
                warn!(
                    event = "sweep.cycle.aborted",
                    owner_context,
                    parent_id = %parent.id,
                    attempts,
                    cause = %cause,
                    "cascade delete gave up"
                );
                Err(CycleError::BudgetExhausted {
                    parent: ResourceRef::parent(self.cascade.parent, parent),
                    cause,
                    attempts,
                    last_failure: last_error,
                })
            }
        }
    }

    /// Lists the current children, deletes them, then deletes the parent.
    /// Returns whether this pass removed the parent.
    async fn cascade_pass(
        &self,
        owner_context: &str,
        parent: &ParentResource,
        deleted_children: &AtomicUsize,
    ) -> Result<bool, Attempt<PassFailure>> {
        let parent_ref = ResourceRef::parent(self.cascade.parent, parent);
        let children = match self
            .directory
            .list_children(owner_context, self.cascade.child, parent)
            .await
        {
            Ok(children) => children,
            Err(error) => {
                let class = error.class();
                if class == ErrorClass::NotFound {
                    debug!(
                        event = "sweep.cycle.parent_gone",
                        owner_context,
                        parent_id = %parent.id,
                        "parent disappeared before its children could be listed"
                    );
                    return Ok(false);
                }
                return Err(PassFailure {
                    target: parent_ref,
                    error,
                }
                .into_attempt(class));
            }
        };

        for child in &children {
            if self.delete_child(owner_context, child).await? {
                deleted_children.fetch_add(1, Ordering::SeqCst);
            }
        }

        self.delete_target(owner_context, &parent_ref).await
    }

    async fn delete_child(
        &self,
        owner_context: &str,
        child: &ChildResource,
    ) -> Result<bool, Attempt<PassFailure>> {
        let target = ResourceRef::child(self.cascade.child, child);
        self.delete_target(owner_context, &target).await
    }

    /// Deletes `target`, returning `false` when it was already gone.
    async fn delete_target(
        &self,
        owner_context: &str,
        target: &ResourceRef,
    ) -> Result<bool, Attempt<PassFailure>> {
        match self.directory.delete(owner_context, target).await {
            Ok(()) => Ok(true),
            Err(error) => {
                let class = error.class();
                if class == ErrorClass::NotFound {
                    debug!(
                        event = "sweep.cycle.already_deleted",
                        owner_context,
                        target = %target,
                        "resource already deleted"
                    );
                    return Ok(false);
                }
                Err(PassFailure {
                    target: target.clone(),
                    error,
                }
                .into_attempt(class))
            }
        }
    }
}
