//! Command-line and environment configuration.
//!
//! Every option can come from a flag or from the environment variable CI
//! already sets. Validation runs before any network client is constructed:
//! conflicting or missing account identity and a malformed dry-run value are
//! configuration errors, not registry errors.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::registry::Account;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("provide either an organization or a user, not both")]
    ConflictingAccount,
    #[error("missing account identity: set --org or --user")]
    MissingAccount,
    #[error("invalid boolean value {0:?} for dry-run")]
    InvalidDryRun(String),
}

/// ghcr-reconcile
#[derive(Debug, Parser)]
#[clap(name = "ghcr-reconcile", version)]
pub struct App {
    /// GitHub token used for both the REST API and the registry
    #[clap(long, env = "GH_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Organization owning the package
    #[clap(long, env = "GH_ORG")]
    pub org: Option<String>,

    /// User owning the package
    #[clap(long, env = "GH_USER")]
    pub user: Option<String>,

    /// Name of the package
    #[clap(long, env = "PACKAGE_NAME")]
    pub package: String,

    /// Type of the package
    #[clap(long, env = "PACKAGE_TYPE", default_value = "container")]
    pub package_type: String,

    /// Compute and report actions without mutating the registry
    /// (boolean-like: 1/t/true/0/f/false)
    #[clap(long, env = "DRYRUN", default_value = "false")]
    pub dry_run: String,

    /// Path of the job summary file to append the report to;
    /// the report goes to stdout when unset
    #[clap(long, env = "GITHUB_STEP_SUMMARY")]
    pub summary: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: RunCommand,
}

#[derive(Debug, Subcommand)]
pub enum RunCommand {
    /// Delete cosign signature versions whose signed digest no longer exists
    PruneSignatures,
    /// Assign platform-derived tags to the sub-manifests of a manifest list
    TagManifests {
        /// Version tag whose manifest list is inspected
        #[clap(long, env = "IMAGE_TAG")]
        tag: String,
    },
}

/// Validated settings, ready to run.
#[derive(Debug)]
pub struct Settings {
    pub token: String,
    pub account: Account,
    pub package: String,
    pub package_type: String,
    pub dry_run: bool,
    pub summary: Option<PathBuf>,
    pub command: RunCommand,
}

impl App {
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let account = resolve_account(self.org, self.user)?;
        let dry_run = parse_boolish(&self.dry_run)?;
        Ok(Settings {
            token: self.token,
            account,
            package: self.package,
            package_type: self.package_type,
            dry_run,
            summary: self.summary,
            command: self.command,
        })
    }
}

/// Pick the account identity: exactly one of organization or user.
fn resolve_account(
    org: Option<String>,
    user: Option<String>,
) -> Result<Account, ConfigError> {
    match (org, user) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingAccount),
        (Some(org), None) => Ok(Account::Organization(org)),
        (None, Some(user)) => Ok(Account::User(user)),
        (None, None) => Err(ConfigError::MissingAccount),
    }
}

/// Parse the boolean grammar CI variables commonly use.
fn parse_boolish(value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(ConfigError::InvalidDryRun(value.to_owned())),
    }
}
