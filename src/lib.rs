//! Core library for the `ovh-sweep` test-resource sweeper.
//!
//! Acceptance tests leave private networks behind when they fail part way.
//! The crate finds networks carrying the test prefix in the configured cloud
//! project and deletes each one after its subnets, retrying transient API
//! errors within a per-network time budget.

pub mod config;
pub mod directory;
pub mod ovh;
pub mod reclaim;
pub mod retry;
pub mod sweep;
pub mod test_support;

pub use config::{ConfigError, SweepSettings};
pub use directory::{
    ApiError, ApiErrorKind, Cascade, ChildResource, ErrorClass, ParentResource,
    ResourceDirectory, ResourceKind, ResourceRef,
};
pub use ovh::{OvhClient, OvhClientError, OvhCredentials};
pub use reclaim::{
    CycleError, CycleOutcome, CycleSummary, ReclaimConfig, ReclaimError, ReclaimReport, Reclaimer,
};
pub use retry::{AbortCause, Backoff, RetryError, RetryPolicy, retry_within_budget};
pub use sweep::{SweepCoordinator, SweepError, SweepRecord, Sweeper, SweeperRegistry};
