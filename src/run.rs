//! Top-level reconciliation pipelines.
//!
//! One async function per policy, wiring fetch → classify → match → plan →
//! execute. A registry failure during the read phase aborts before anything
//! is planned or mutated; failures during execution are isolated per action
//! and surfaced in the outcome.

use log::info;

use crate::classify::{classify_versions, entries_from_index};
use crate::execute::{execute, ExecutionOutcome};
use crate::matcher::orphaned_signatures;
use crate::plan::{plan_manifest_tagging, plan_signature_pruning, Policy, RunReport};
use crate::registry::{Package, Registry, RegistryError};

/// The complete result of one run: the plan and what execution did with it.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub execution: ExecutionOutcome,
}

/// Delete every cosign signature object whose signed digest no longer exists
/// among the package's content versions.
pub async fn prune_signatures<R: Registry>(
    registry: &R,
    package: &Package,
    dry_run: bool,
) -> Result<RunOutcome, RegistryError> {
    info!("fetching versions of package {}", package.name);
    let versions = registry.list_package_versions(package).await?;
    info!("classifying {} version(s)", versions.len());

    let classified = classify_versions(&versions);
    let orphans = orphaned_signatures(&classified.signatures, &classified.content_digests);
    info!(
        "{} signature object(s), {} orphaned",
        classified.signatures.len(),
        orphans.len()
    );

    let actions = plan_signature_pruning(&orphans);
    let report = RunReport::new(Policy::PruneSignatures, actions, Vec::new(), dry_run);
    let execution = execute(registry, package, &report).await;
    Ok(RunOutcome { report, execution })
}

/// Assign a platform-derived tag to every sub-manifest of the manifest list
/// published under `base_tag`.
pub async fn tag_manifests<R: Registry>(
    registry: &R,
    package: &Package,
    base_tag: &str,
    dry_run: bool,
) -> Result<RunOutcome, RegistryError> {
    info!("fetching manifest list for {}:{base_tag}", package.name);
    let index = registry.fetch_manifest_list(package, base_tag).await?;
    let entries = entries_from_index(&index);
    info!("manifest list has {} entry(ies)", entries.len());

    let (actions, warnings) = plan_manifest_tagging(base_tag, &entries);
    let report = RunReport::new(Policy::TagManifests, actions, warnings, dry_run);
    let execution = execute(registry, package, &report).await;
    Ok(RunOutcome { report, execution })
}
