//! Shared fixtures and helpers for reclaim BDD scenarios.

use std::time::Duration;

use ovh_sweep::test_support::ScriptedDirectory;
use ovh_sweep::{Backoff, Cascade, ReclaimConfig, ReclaimError, ReclaimReport, Reclaimer};
use rstest::fixture;

/// Owner context used when a scenario does not configure one explicitly.
pub const PROJECT: &str = "project-1";

#[derive(Clone, Debug)]
pub struct ReclaimContext {
    pub owner_context: Option<String>,
    pub directory: ScriptedDirectory,
    pub outcome: Option<Result<ReclaimReport, ReclaimError>>,
}

#[fixture]
pub fn reclaim_context() -> ReclaimContext {
    ReclaimContext {
        owner_context: Some(PROJECT.to_owned()),
        directory: ScriptedDirectory::new(),
        outcome: None,
    }
}

/// Runs a reclamation on a paused current-thread runtime so retries advance
/// virtual time only.
pub fn run_reclaim(
    context: &ReclaimContext,
    budget: Duration,
) -> Result<ReclaimReport, ReclaimError> {
    let config = ReclaimConfig::new(context.owner_context.clone(), "terraform_testacc")
        .and_then(|config| config.with_time_budget(budget))
        .unwrap_or_else(|err| panic!("reclaim config should be valid: {err}"))
        .with_backoff(Backoff::fixed(Duration::from_secs(1)));
    let reclaimer = Reclaimer::new(context.directory.clone(), Cascade::PRIVATE_NETWORK);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap_or_else(|err| panic!("failed to build runtime: {err}"));
    runtime.block_on(reclaimer.reclaim(&config))
}

pub fn split_ids(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}
