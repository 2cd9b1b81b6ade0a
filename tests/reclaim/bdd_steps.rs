//! BDD step definitions for private network reclamation.

use std::time::Duration;

use ovh_sweep::{ApiError, CycleError, ReclaimError};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{ReclaimContext, run_reclaim, split_ids};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a test project \"{project}\"")]
fn test_project(mut reclaim_context: ReclaimContext, project: String) -> ReclaimContext {
    reclaim_context.owner_context = Some(project.trim().to_owned());
    reclaim_context
}

#[given("no test project is configured")]
fn no_test_project(mut reclaim_context: ReclaimContext) -> ReclaimContext {
    reclaim_context.owner_context = None;
    reclaim_context
}

#[given("a network \"{id}\" named \"{name}\" with subnets \"{subnets}\"")]
fn network_with_subnets(
    reclaim_context: ReclaimContext,
    id: String,
    name: String,
    subnets: String,
) -> ReclaimContext {
    let owner = reclaim_context
        .owner_context
        .clone()
        .unwrap_or_else(|| String::from("unconfigured"));
    reclaim_context.directory.add_parent(&owner, &id, &name);
    for subnet in split_ids(&subnets) {
        reclaim_context.directory.add_child(&id, &subnet);
    }
    reclaim_context
}

#[given("deleting \"{id}\" fails once with status {status:u16}")]
fn delete_fails_once(reclaim_context: ReclaimContext, id: String, status: u16) -> ReclaimContext {
    reclaim_context
        .directory
        .fail_delete_once(&id, ApiError::http(status, "scripted failure"));
    reclaim_context
}

#[given("deleting \"{id}\" always fails with status {status:u16}")]
fn delete_always_fails(reclaim_context: ReclaimContext, id: String, status: u16) -> ReclaimContext {
    reclaim_context
        .directory
        .fail_delete_always(&id, ApiError::http(status, "scripted failure"));
    reclaim_context
}

#[when("I reclaim private networks with a {seconds:u64} second budget")]
fn reclaim_networks(mut reclaim_context: ReclaimContext, seconds: u64) -> ReclaimContext {
    reclaim_context.outcome = Some(run_reclaim(
        &reclaim_context,
        Duration::from_secs(seconds),
    ));
    reclaim_context
}

#[then("the reclaim reports {networks:usize} network and {subnets:usize} subnets deleted")]
fn reports_deletions(
    reclaim_context: &ReclaimContext,
    networks: usize,
    subnets: usize,
) -> Result<(), StepError> {
    let Some(outcome) = reclaim_context.outcome.as_ref() else {
        return Err(StepError::Assertion(String::from("missing outcome")));
    };
    let Ok(report) = outcome else {
        return Err(StepError::Assertion(format!(
            "expected success, got: {outcome:?}"
        )));
    };
    if report.deleted_parents() == networks && report.deleted_children() == subnets {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {networks} networks and {subnets} subnets, got {report:?}"
        )))
    }
}

#[then("the subnets of \"{id}\" are deleted before the network")]
fn subnets_deleted_first(reclaim_context: &ReclaimContext, id: String) -> Result<(), StepError> {
    let order = reclaim_context.directory.delete_order();
    let Some(network_position) = order.iter().position(|deleted| *deleted == id) else {
        return Err(StepError::Assertion(format!(
            "network {id} was never deleted: {order:?}"
        )));
    };
    let subnets_after = order
        .iter()
        .skip(network_position)
        .any(|deleted| deleted.starts_with("sub-"));
    if subnets_after {
        Err(StepError::Assertion(format!(
            "subnet deleted after network {id}: {order:?}"
        )))
    } else {
        Ok(())
    }
}

#[then("network \"{id}\" still exists")]
fn network_remains(reclaim_context: &ReclaimContext, id: String) -> Result<(), StepError> {
    let remaining = reclaim_context.directory.remaining_parents();
    if remaining.contains(&id) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {id} to remain, got {remaining:?}"
        )))
    }
}

#[then("network \"{id}\" needed {attempts:u32} attempts")]
fn network_attempts(
    reclaim_context: &ReclaimContext,
    id: String,
    attempts: u32,
) -> Result<(), StepError> {
    let summary = reclaim_context
        .outcome
        .as_ref()
        .and_then(|outcome| outcome.as_ref().ok())
        .and_then(|report| {
            report
                .outcomes
                .iter()
                .find(|cycle| cycle.parent.id == id)
        })
        .and_then(|cycle| cycle.result.as_ref().ok())
        .ok_or_else(|| StepError::Assertion(format!("no successful cycle for {id}")))?;
    if summary.attempts == attempts {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {attempts} attempts, got {}",
            summary.attempts
        )))
    }
}

#[then("the reclaim fails with an exhausted budget for \"{id}\"")]
fn fails_with_exhausted_budget(
    reclaim_context: &ReclaimContext,
    id: String,
) -> Result<(), StepError> {
    let Some(Err(ReclaimError::Incomplete(incomplete))) = reclaim_context.outcome.as_ref() else {
        return Err(StepError::Assertion(format!(
            "expected an incomplete reclaim, got: {:?}",
            reclaim_context.outcome
        )));
    };
    match &incomplete.first {
        CycleError::BudgetExhausted { parent, .. } if parent.id == id => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected budget exhaustion for {id}, got: {other}"
        ))),
    }
}

#[then("the reclaim is skipped without calling the API")]
fn reclaim_skipped(reclaim_context: &ReclaimContext) -> Result<(), StepError> {
    let skipped = matches!(
        reclaim_context.outcome.as_ref(),
        Some(Ok(report)) if report.skipped
    );
    let calls = reclaim_context.directory.calls();
    if skipped && calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a skipped run with no calls, got {:?} and {calls:?}",
            reclaim_context.outcome
        )))
    }
}
