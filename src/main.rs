//! Binary entry point for the `ovh-sweep` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ovh_sweep::{
    ConfigError, OvhClient, ReclaimReport, SweepCoordinator, SweepError, SweepRecord,
    SweepSettings, SweeperRegistry,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
    #[error("failed to write summary: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match execute(&cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

/// Runs the sweep and reports whether every record succeeded.
async fn execute(cli: &Cli) -> Result<bool, CliError> {
    let settings = SweepSettings::load_without_cli_args()?;
    let credentials = settings.credentials()?;
    let config = settings.reclaim_config()?;

    let coordinator = SweepCoordinator::new(
        SweeperRegistry::with_defaults(),
        config,
        |_region: &str| OvhClient::new(credentials.clone()),
    )
    .allow_failures(cli.sweep_allow_failures);
    cancel_on_interrupt(coordinator.cancellation_token());

    let records = coordinator.run(&cli.regions, &cli.sweep_run).await?;
    let mut stdout = io::stdout();
    for record in &records {
        writeln!(stdout, "{}", summary_line(record))?;
    }
    Ok(records.iter().all(SweepRecord::succeeded))
}

fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(event = "sweep.signal_received", signal = "SIGINT");
            token.cancel();
        }
    });
}

fn summary_line(record: &SweepRecord) -> String {
    let outcome = match &record.result {
        Ok(report) if report.skipped => String::from("skipped: test project not configured"),
        Ok(report) => deleted_counts(report),
        Err(err) => format!("failed: {err}"),
    };
    format!("sweeper {} in {}: {outcome}", record.sweeper, record.region)
}

fn deleted_counts(report: &ReclaimReport) -> String {
    format!(
        "deleted_networks={}, deleted_subnets={}",
        report.deleted_parents(),
        report.deleted_children()
    )
}

fn report_error(err: &CliError) {
    writeln!(io::stderr(), "{err}").ok();
}
