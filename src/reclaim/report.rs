//! Aggregated results of a reclamation run.

use std::fmt;

use crate::directory::ParentResource;

use super::CycleError;

/// Work done by one successful cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CycleSummary {
    /// Children deleted across all attempts; already-absent children are not
    /// counted.
    pub deleted_children: usize,
    /// Attempts needed to finish the cycle.
    pub attempts: u32,
    /// `false` when the parent was already gone before this cycle removed it.
    pub parent_deleted: bool,
}

/// Result of reclaiming one parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CycleOutcome {
    /// Parent the cycle targeted.
    pub parent: ParentResource,
    /// Summary on success, or the reason the cycle failed.
    pub result: Result<CycleSummary, CycleError>,
}

/// Outcome of a whole reclamation run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReclaimReport {
    /// `true` when the run was skipped because no owner context was set.
    pub skipped: bool,
    /// One entry per matched parent, in listing order.
    pub outcomes: Vec<CycleOutcome>,
}

impl ReclaimReport {
    /// Report for a run that had nothing to do.
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            skipped: true,
            outcomes: Vec::new(),
        }
    }

    /// Number of parents removed by successful cycles; parents that had
    /// already disappeared are not counted.
    #[must_use]
    pub fn deleted_parents(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .filter(|summary| summary.parent_deleted)
            .count()
    }

    /// Number of parents whose cycle succeeded, deleted or already gone.
    #[must_use]
    pub fn reclaimed_parents(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .count()
    }

    /// Number of children deleted by successful cycles.
    #[must_use]
    pub fn deleted_children(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .map(|summary| summary.deleted_children)
            .sum()
    }

    /// Number of parents whose cycle failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .count()
    }

    /// First failure in listing order.
    #[must_use]
    pub fn first_failure(&self) -> Option<&CycleError> {
        self.outcomes
            .iter()
            .find_map(|outcome| outcome.result.as_ref().err())
    }
}

/// Report of a run in which at least one cycle failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IncompleteReclaim {
    /// Number of failed cycles.
    pub failed: usize,
    /// First failure in listing order.
    pub first: CycleError,
    /// Every outcome, including the successful ones.
    pub report: ReclaimReport,
}

impl fmt::Display for IncompleteReclaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} cycle(s) failed; first failure: {}",
            self.failed,
            self.report.outcomes.len(),
            self.first
        )
    }
}
