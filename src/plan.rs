//! Action planning.
//!
//! The planners turn classified and matched snapshots into an ordered list of
//! reconciliation actions. They are pure functions and never see the dry-run
//! flag: the plan is identical for a dry and a live run, only execution
//! differs. Each planner enforces the uniqueness invariant — no two actions
//! target the same version ID or the same (digest, tag) pair.

use std::collections::HashSet;
use std::fmt;

use crate::classify::{ManifestEntry, SignatureObject};
use crate::matcher::{resolve_reference, Reference};

/// One corrective registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Delete an orphaned signature version.
    DeleteSignature { version_id: u64, tag: String },
    /// Assign a derived tag to a sub-manifest digest.
    AssignTag { digest: String, new_tag: String },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DeleteSignature { version_id, tag } => {
                write!(f, "delete signature version {version_id} ({tag})")
            }
            Action::AssignTag { digest, new_tag } => {
                write!(f, "tag {digest} as {new_tag}")
            }
        }
    }
}

/// Which reconciliation policy a run applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    PruneSignatures,
    TagManifests,
}

/// The outcome of the planning phase for one run.
///
/// Holds every *planned* action regardless of dry-run; constructed once and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub policy: Policy,
    pub actions: Vec<Action>,
    /// Planner warnings, e.g. attestation entries whose reference could not
    /// be resolved.
    pub warnings: Vec<String>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(policy: Policy, actions: Vec<Action>, warnings: Vec<String>, dry_run: bool) -> Self {
        RunReport {
            policy,
            actions,
            warnings,
            dry_run,
        }
    }

    /// Whether the run planned any action at all.
    pub fn any_action_planned(&self) -> bool {
        !self.actions.is_empty()
    }
}

/// Plan deletions for orphaned signatures, preserving listing order.
pub fn plan_signature_pruning(orphans: &[SignatureObject]) -> Vec<Action> {
    let mut seen = HashSet::new();
    orphans
        .iter()
        .filter(|orphan| seen.insert(orphan.version_id))
        .map(|orphan| Action::DeleteSignature {
            version_id: orphan.version_id,
            tag: orphan.tag.clone(),
        })
        .collect()
}

/// Plan tag assignments for every entry of a manifest list.
///
/// Platform entries get `{base}-{os}-{arch}`; attestation entries resolve the
/// platform of the entry they attest and get
/// `{base}-attestation-manifest-{os}-{arch}`. Assignments are emitted
/// unconditionally (tagging is an overwrite, so re-running over an
/// already-tagged list replans the same assignments). An attestation whose
/// reference cannot be resolved yields a warning instead of a malformed tag.
pub fn plan_manifest_tagging(
    base_tag: &str,
    entries: &[ManifestEntry],
) -> (Vec<Action>, Vec<String>) {
    let mut actions = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for entry in entries {
        let new_tag = if entry.is_attestation() {
            match resolve_reference(entry, entries) {
                Reference::Platform { os, architecture } => {
                    format!("{base_tag}-attestation-manifest-{os}-{architecture}")
                }
                Reference::Unresolved => {
                    warnings.push(format!(
                        "attestation manifest {} has no resolvable reference digest; not tagged",
                        entry.digest
                    ));
                    continue;
                }
            }
        } else {
            format!("{base_tag}-{}-{}", entry.os, entry.architecture)
        };

        if seen.insert((entry.digest.clone(), new_tag.clone())) {
            actions.push(Action::AssignTag {
                digest: entry.digest.clone(),
                new_tag,
            });
        }
    }

    (actions, warnings)
}
