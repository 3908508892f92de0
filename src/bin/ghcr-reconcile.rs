//! One-shot reconciliation job for GHCR container packages.
//!
//! Intended to run from CI: configuration comes from flags or the usual
//! environment variables, diagnostics go to the log stream, and the
//! human-readable action report is appended to the job summary file.

use anyhow::{bail, Result};
use clap::Parser;
use log::warn;

use ghcr_reconcile::config::{App, RunCommand};
use ghcr_reconcile::registry::{GhcrClient, Package};
use ghcr_reconcile::{prune_signatures, report, tag_manifests};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let settings = App::parse().validate()?;
    let client = GhcrClient::new(&settings.token)?;
    let package = Package {
        account: settings.account,
        package_type: settings.package_type,
        name: settings.package,
    };

    let outcome = match settings.command {
        RunCommand::PruneSignatures => {
            prune_signatures(&client, &package, settings.dry_run).await?
        }
        RunCommand::TagManifests { tag } => {
            tag_manifests(&client, &package, &tag, settings.dry_run).await?
        }
    };

    // The report goes to the summary sink when one is configured; a sink
    // failure must not change the outcome of the run.
    let text = report::render(&outcome.report);
    match &settings.summary {
        Some(path) => {
            if let Err(err) = report::append_to_file(path, &text) {
                warn!("{err}");
            }
        }
        None => print!("{text}"),
    }

    if !outcome.execution.all_succeeded() {
        bail!(
            "{} of {} planned action(s) failed",
            outcome.execution.failures.len(),
            outcome.report.actions.len()
        );
    }
    Ok(())
}
