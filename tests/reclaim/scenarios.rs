//! BDD scenarios for private network reclamation.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ReclaimContext, reclaim_context};

#[scenario(
    path = "tests/features/reclaim.feature",
    name = "Delete subnets before their private network"
)]
fn scenario_delete_children_first(reclaim_context: ReclaimContext) {
    let _ = reclaim_context;
}

#[scenario(
    path = "tests/features/reclaim.feature",
    name = "Retry a transient failure"
)]
fn scenario_retry_transient_failure(reclaim_context: ReclaimContext) {
    let _ = reclaim_context;
}

#[scenario(
    path = "tests/features/reclaim.feature",
    name = "Give up once the budget is exhausted"
)]
fn scenario_budget_exhausted(reclaim_context: ReclaimContext) {
    let _ = reclaim_context;
}

#[scenario(
    path = "tests/features/reclaim.feature",
    name = "Skip when no test project is configured"
)]
fn scenario_skip_unconfigured(reclaim_context: ReclaimContext) {
    let _ = reclaim_context;
}
