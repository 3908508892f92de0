//! Cross-reference resolution between classified artifacts.
//!
//! Matching is exact digest-string equality in both directions: a signature
//! object against the set of live content digests, and an attestation
//! manifest against the entry it references.

use std::collections::HashSet;

use crate::classify::{ManifestEntry, SignatureObject};

/// Filter the signature objects down to the orphans: signatures whose signed
/// digest is absent from the content-digest set. Listing order is preserved.
pub fn orphaned_signatures(
    signatures: &[SignatureObject],
    content_digests: &HashSet<String>,
) -> Vec<SignatureObject> {
    signatures
        .iter()
        .filter(|signature| !content_digests.contains(&signature.signed_digest))
        .cloned()
        .collect()
}

/// The platform an attestation manifest resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// The referenced entry was found; these are its platform fields.
    Platform { os: String, architecture: String },
    /// The reference annotation was missing, or no entry carries the
    /// referenced digest.
    Unresolved,
}

/// Resolve the platform an attestation entry attests, by looking up the
/// entry whose digest matches the reference annotation.
pub fn resolve_reference(entry: &ManifestEntry, all_entries: &[ManifestEntry]) -> Reference {
    let Some(digest) = entry.referenced_digest() else {
        return Reference::Unresolved;
    };
    match all_entries.iter().find(|candidate| candidate.digest == digest) {
        Some(referenced) => Reference::Platform {
            os: referenced.os.clone(),
            architecture: referenced.architecture.clone(),
        },
        None => Reference::Unresolved,
    }
}
