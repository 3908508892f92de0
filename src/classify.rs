//! Artifact classification.
//!
//! Turns raw registry listings into typed, role-tagged entries. Two inputs are
//! classified: the package-version listing (partitioned into cosign signature
//! objects and content digests) and a multi-arch manifest list (viewed as
//! [`ManifestEntry`] values whose role is decided later by the matcher).
//!
//! All functions here are pure; nothing touches the network.

use std::collections::{HashMap, HashSet};

use oci_spec::image::{Descriptor, ImageIndex};

use crate::registry::PackageVersion;

/// Tag prefix used by cosign for detached signature objects.
const SIGNATURE_PREFIX: &str = "sha256-";
/// Tag suffix used by cosign for detached signature objects.
const SIGNATURE_SUFFIX: &str = ".sig";

/// Annotation key an attestation manifest uses to reference the digest of the
/// image manifest it attests.
pub const REFERENCE_DIGEST_ANNOTATION: &str = "vnd.docker.reference.digest";

/// Platform architecture value marking attestation/reference manifests.
pub const UNKNOWN_ARCHITECTURE: &str = "unknown";

/// Whether a tag marks a cosign signature object.
pub fn is_signature_tag(tag: &str) -> bool {
    decode_signature_tag(tag).is_some()
}

/// Decode the digest a cosign signature tag encodes.
///
/// `sha256-<64 lowercase hex chars>.sig` decodes to `sha256:<hex>`; anything
/// else is not a signature tag.
pub fn decode_signature_tag(tag: &str) -> Option<String> {
    let hex = tag
        .strip_prefix(SIGNATURE_PREFIX)?
        .strip_suffix(SIGNATURE_SUFFIX)?;
    if hex.len() == 64 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        Some(format!("sha256:{hex}"))
    } else {
        None
    }
}

/// A package version identified as a cosign signature object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureObject {
    /// The version's listing identifier, the deletion target.
    pub version_id: u64,
    /// The tag that matched the signature pattern.
    pub tag: String,
    /// The digest the tag encodes (`sha256:...`).
    pub signed_digest: String,
}

/// The partitioned view of a package-version listing.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedVersions {
    /// Signature objects, in listing order.
    pub signatures: Vec<SignatureObject>,
    /// Resolved digests of all content (non-signature) versions.
    pub content_digests: HashSet<String>,
}

/// Partition a version listing into signature objects and content digests.
///
/// A version is a signature object if *any* of its tags matches the cosign
/// pattern; the matched tag is recorded for reporting and deletion. Every
/// other version is a content object and contributes its resolved digest to
/// the matching set.
pub fn classify_versions(versions: &[PackageVersion]) -> ClassifiedVersions {
    let mut classified = ClassifiedVersions::default();
    for version in versions {
        let signature = version.tags().iter().find_map(|tag| {
            decode_signature_tag(tag).map(|signed_digest| SignatureObject {
                version_id: version.id,
                tag: tag.clone(),
                signed_digest,
            })
        });
        match signature {
            Some(signature) => classified.signatures.push(signature),
            None => {
                classified.content_digests.insert(version.digest().to_owned());
            }
        }
    }
    classified
}

/// One entry of a multi-arch manifest list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestEntry {
    pub digest: String,
    pub media_type: String,
    pub os: String,
    pub architecture: String,
    pub annotations: HashMap<String, String>,
}

impl ManifestEntry {
    /// Whether this entry is an attestation/reference manifest rather than a
    /// platform image manifest.
    pub fn is_attestation(&self) -> bool {
        self.architecture == UNKNOWN_ARCHITECTURE
    }

    /// The digest this entry references via annotation, if any.
    pub fn referenced_digest(&self) -> Option<&str> {
        self.annotations
            .get(REFERENCE_DIGEST_ANNOTATION)
            .map(String::as_str)
    }
}

impl From<&Descriptor> for ManifestEntry {
    fn from(descriptor: &Descriptor) -> Self {
        // An entry without a platform block is treated like the explicit
        // unknown/unknown platform buildx puts on attestation manifests.
        let (os, architecture) = match descriptor.platform() {
            Some(platform) => (
                platform.os().to_string(),
                platform.architecture().to_string(),
            ),
            None => (UNKNOWN_ARCHITECTURE.to_owned(), UNKNOWN_ARCHITECTURE.to_owned()),
        };
        ManifestEntry {
            digest: descriptor.digest().to_string(),
            media_type: descriptor.media_type().to_string(),
            os,
            architecture,
            annotations: descriptor.annotations().clone().unwrap_or_default(),
        }
    }
}

/// View a manifest list as typed entries, preserving order.
pub fn entries_from_index(index: &ImageIndex) -> Vec<ManifestEntry> {
    index.manifests().iter().map(ManifestEntry::from).collect()
}
