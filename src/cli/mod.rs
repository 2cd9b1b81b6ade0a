//! Command-line interface definitions for the `ovh-sweep` binary.
//!
//! This module centralises the clap parser structures so both the binary and
//! the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `ovh-sweep` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ovh-sweep",
    about = "Delete private networks and subnets left behind by OVH acceptance tests",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Regions to sweep, comma separated.
    #[arg(long = "sweep", value_name = "REGIONS", value_delimiter = ',', required = true)]
    pub(crate) regions: Vec<String>,
    /// Only run sweepers whose name contains one of these terms.
    #[arg(long = "sweep-run", value_name = "NAMES", value_delimiter = ',')]
    pub(crate) sweep_run: Vec<String>,
    /// Keep sweeping after a sweeper fails.
    #[arg(long = "sweep-allow-failures")]
    pub(crate) sweep_allow_failures: bool,
}
