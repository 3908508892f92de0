//! Reconciliation engine for GHCR container packages.
//!
//! This crate reconciles the artifacts published under a GitHub container
//! package against the artifacts that should still exist, and applies
//! corrective actions:
//!
//! - **Signature pruning**: a cosign signature object (a version tagged
//!   `sha256-<digest>.sig`) whose signed digest no longer corresponds to any
//!   live content version is deleted.
//! - **Manifest tagging**: every sub-manifest of a multi-arch manifest list is
//!   given a stable, human-readable tag derived from its platform, or for
//!   attestation manifests, from the platform of the entry they attest.
//!
//! The engine is split into pure stages (classify, match, plan) over immutable
//! snapshots, a thin executor that performs the registry mutations, and a
//! report writer for CI job summaries. The planned action set is a pure
//! function of the input snapshot; a dry run computes exactly the same plan
//! and only suppresses execution.

#![forbid(unsafe_code)]

pub mod classify;
pub mod config;
pub mod execute;
pub mod matcher;
pub mod plan;
pub mod registry;
pub mod report;
pub mod run;

pub use classify::{classify_versions, decode_signature_tag, is_signature_tag, ManifestEntry};
pub use matcher::{orphaned_signatures, resolve_reference, Reference};
pub use plan::{plan_manifest_tagging, plan_signature_pruning, Action, Policy, RunReport};
pub use registry::{Account, GhcrClient, Package, PackageVersion, Registry, RegistryError};
pub use run::{prune_signatures, tag_manifests, RunOutcome};
