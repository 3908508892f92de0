//! Job-summary rendering and the report sink.
//!
//! The report is the human-readable record of a run, separate from the
//! diagnostic log stream. Rendering is deterministic: a dry-run banner, a
//! header naming the action category, one table row per planned action, and a
//! fixed sentence when nothing was found. The sink is append-only; a sink
//! failure never changes the outcome of the run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::plan::{Action, Policy, RunReport};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("could not append to report file {path}: {source}")]
    Append {
        path: String,
        source: std::io::Error,
    },
}

/// Render a run report as Markdown.
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();

    if report.dry_run {
        let banner = match report.policy {
            Policy::PruneSignatures => {
                ":warning: This is a dry run, no signatures were actually deleted."
            }
            Policy::TagManifests => {
                ":warning: This is a dry run, no tags were actually assigned."
            }
        };
        out.push_str(banner);
        out.push_str("\n\n");
    }

    if report.any_action_planned() {
        match report.policy {
            Policy::PruneSignatures => {
                out.push_str("## Pruned Cosign Signatures\n\n");
                out.push_str("| Tags |\n|--------------|\n");
                for action in &report.actions {
                    if let Action::DeleteSignature { tag, .. } = action {
                        out.push_str(&format!("| {tag} |\n"));
                    }
                }
            }
            Policy::TagManifests => {
                out.push_str("## Tagged Versions\n\n");
                out.push_str("| Digest | Tag |\n|--------|-----|\n");
                for action in &report.actions {
                    if let Action::AssignTag { digest, new_tag } = action {
                        out.push_str(&format!("| {digest} | {new_tag} |\n"));
                    }
                }
            }
        }
        out.push('\n');
    } else {
        let nothing = match report.policy {
            Policy::PruneSignatures => "No orphaned signatures found.\n",
            Policy::TagManifests => "No untagged versions found.\n",
        };
        out.push_str(nothing);
    }

    if !report.warnings.is_empty() {
        out.push_str("\n### Warnings\n\n");
        for warning in &report.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
    }

    out
}

/// Append rendered report text to the summary file, creating it if needed.
/// Existing content is never overwritten.
pub fn append_to_file(path: &Path, text: &str) -> Result<(), ReportError> {
    let append = |path: &Path| -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes())
    };
    append(path).map_err(|source| ReportError::Append {
        path: path.display().to_string(),
        source,
    })
}
