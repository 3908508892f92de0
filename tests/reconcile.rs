//! End-to-end reconciliation runs against an in-memory registry.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;

use oci_spec::image::{
    Descriptor, DescriptorBuilder, Digest, ImageIndex, ImageIndexBuilder, MediaType,
    PlatformBuilder,
};
use similar_asserts::assert_eq;

use ghcr_reconcile::classify::REFERENCE_DIGEST_ANNOTATION;
use ghcr_reconcile::registry::{
    Account, ContainerMetadata, Package, PackageVersion, Registry, RegistryError, StatusCode,
    VersionMetadata,
};
use ghcr_reconcile::{plan::Action, prune_signatures, report, tag_manifests};

fn fake_digest(seed: u8) -> String {
    format!("sha256:{}", format!("{seed:02x}").repeat(32))
}

fn signature_tag(seed: u8) -> String {
    format!("sha256-{}.sig", format!("{seed:02x}").repeat(32))
}

fn version(id: u64, digest: &str, tags: &[&str]) -> PackageVersion {
    PackageVersion {
        id,
        name: digest.to_owned(),
        metadata: VersionMetadata {
            container: ContainerMetadata {
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
            },
        },
    }
}

fn platform_descriptor(digest: &str, os: &str, arch: &str) -> Descriptor {
    DescriptorBuilder::default()
        .media_type(MediaType::ImageManifest)
        .digest(Digest::from_str(digest).unwrap())
        .size(1024u64)
        .platform(
            PlatformBuilder::default()
                .os(os)
                .architecture(arch)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn attestation_descriptor(digest: &str, references: &str) -> Descriptor {
    DescriptorBuilder::default()
        .media_type(MediaType::ImageManifest)
        .digest(Digest::from_str(digest).unwrap())
        .size(512u64)
        .platform(
            PlatformBuilder::default()
                .os("unknown")
                .architecture("unknown")
                .build()
                .unwrap(),
        )
        .annotations(std::collections::HashMap::from([(
            REFERENCE_DIGEST_ANNOTATION.to_owned(),
            references.to_owned(),
        )]))
        .build()
        .unwrap()
}

fn index_of(manifests: Vec<Descriptor>) -> ImageIndex {
    ImageIndexBuilder::default()
        .schema_version(2u32)
        .media_type(MediaType::ImageIndex)
        .manifests(manifests)
        .build()
        .unwrap()
}

#[derive(Default)]
struct MockRegistry {
    versions: Vec<PackageVersion>,
    index: Option<ImageIndex>,
    fail_version_ids: HashSet<u64>,
    deleted: Mutex<Vec<u64>>,
    tagged: Mutex<Vec<(String, String)>>,
}

impl Registry for MockRegistry {
    async fn list_package_versions(
        &self,
        _package: &Package,
    ) -> Result<Vec<PackageVersion>, RegistryError> {
        Ok(self.versions.clone())
    }

    async fn fetch_manifest_list(
        &self,
        _package: &Package,
        _tag: &str,
    ) -> Result<ImageIndex, RegistryError> {
        Ok(self.index.clone().expect("no index configured"))
    }

    async fn delete_package_version(
        &self,
        _package: &Package,
        version_id: u64,
    ) -> Result<(), RegistryError> {
        if self.fail_version_ids.contains(&version_id) {
            return Err(RegistryError::Api {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "injected failure".into(),
            });
        }
        self.deleted.lock().unwrap().push(version_id);
        Ok(())
    }

    async fn tag_manifest(
        &self,
        _package: &Package,
        digest: &str,
        new_tag: &str,
    ) -> Result<(), RegistryError> {
        self.tagged
            .lock()
            .unwrap()
            .push((digest.to_owned(), new_tag.to_owned()));
        Ok(())
    }
}

fn test_package() -> Package {
    Package {
        account: Account::Organization("acme".into()),
        package_type: "container".into(),
        name: "builder".into(),
    }
}

#[tokio::test]
async fn prunes_only_the_orphaned_signature() {
    let registry = MockRegistry {
        versions: vec![
            version(1, &fake_digest(0xaa), &["latest"]),
            version(2, &fake_digest(0x01), &[&signature_tag(0xaa)]),
            version(3, &fake_digest(0x02), &[&signature_tag(0xcc)]),
        ],
        ..Default::default()
    };

    let outcome = prune_signatures(&registry, &test_package(), false)
        .await
        .unwrap();

    assert_eq!(
        outcome.report.actions,
        vec![Action::DeleteSignature {
            version_id: 3,
            tag: signature_tag(0xcc),
        }]
    );
    assert_eq!(*registry.deleted.lock().unwrap(), vec![3]);
    assert!(outcome.execution.all_succeeded());
    assert_eq!(outcome.execution.executed, 1);

    let text = report::render(&outcome.report);
    assert!(text.contains("## Pruned Cosign Signatures"));
    assert!(text.contains(&signature_tag(0xcc)));
    assert!(!text.contains(&signature_tag(0xaa)));
}

#[tokio::test]
async fn dry_run_plans_the_same_actions_but_executes_none() {
    let make_registry = || MockRegistry {
        versions: vec![
            version(1, &fake_digest(0xaa), &["v1"]),
            version(2, &fake_digest(0x01), &[&signature_tag(0xcc)]),
        ],
        ..Default::default()
    };

    let dry = make_registry();
    let live = make_registry();
    let dry_outcome = prune_signatures(&dry, &test_package(), true).await.unwrap();
    let live_outcome = prune_signatures(&live, &test_package(), false)
        .await
        .unwrap();

    assert_eq!(dry_outcome.report.actions, live_outcome.report.actions);
    assert!(dry.deleted.lock().unwrap().is_empty());
    assert_eq!(*live.deleted.lock().unwrap(), vec![2]);

    let text = report::render(&dry_outcome.report);
    assert!(text.starts_with(":warning: This is a dry run"));
}

#[tokio::test]
async fn empty_listing_plans_nothing_and_touches_nothing() {
    let registry = MockRegistry::default();
    let outcome = prune_signatures(&registry, &test_package(), false)
        .await
        .unwrap();

    assert!(outcome.report.actions.is_empty());
    assert!(registry.deleted.lock().unwrap().is_empty());
    assert_eq!(
        report::render(&outcome.report),
        "No orphaned signatures found.\n"
    );
}

#[tokio::test]
async fn a_failing_delete_does_not_stop_the_rest() {
    let registry = MockRegistry {
        versions: vec![
            version(1, &fake_digest(0x01), &[&signature_tag(0xcc)]),
            version(2, &fake_digest(0x02), &[&signature_tag(0xdd)]),
        ],
        fail_version_ids: HashSet::from([1]),
        ..Default::default()
    };

    let outcome = prune_signatures(&registry, &test_package(), false)
        .await
        .unwrap();

    assert_eq!(outcome.report.actions.len(), 2);
    assert_eq!(outcome.execution.executed, 1);
    assert_eq!(outcome.execution.failures.len(), 1);
    assert!(!outcome.execution.all_succeeded());
    assert_eq!(*registry.deleted.lock().unwrap(), vec![2]);
}

#[tokio::test]
async fn tags_platform_and_attestation_manifests() {
    let d1 = fake_digest(0x11);
    let d2 = fake_digest(0x22);
    let registry = MockRegistry {
        index: Some(index_of(vec![
            platform_descriptor(&d1, "linux", "amd64"),
            attestation_descriptor(&d2, &d1),
        ])),
        ..Default::default()
    };

    let outcome = tag_manifests(&registry, &test_package(), "v1", false)
        .await
        .unwrap();

    assert_eq!(
        *registry.tagged.lock().unwrap(),
        vec![
            (d1.clone(), "v1-linux-amd64".to_owned()),
            (d2.clone(), "v1-attestation-manifest-linux-amd64".to_owned()),
        ]
    );
    assert!(outcome.report.warnings.is_empty());

    let text = report::render(&outcome.report);
    assert!(text.contains("## Tagged Versions"));
    assert!(text.contains(&format!("| {d1} | v1-linux-amd64 |")));
}

#[tokio::test]
async fn dangling_attestation_reference_becomes_a_warning() {
    let d2 = fake_digest(0x22);
    let registry = MockRegistry {
        index: Some(index_of(vec![attestation_descriptor(
            &d2,
            &fake_digest(0x33),
        )])),
        ..Default::default()
    };

    let outcome = tag_manifests(&registry, &test_package(), "v1", false)
        .await
        .unwrap();

    assert!(outcome.report.actions.is_empty());
    assert_eq!(outcome.report.warnings.len(), 1);
    assert!(registry.tagged.lock().unwrap().is_empty());

    let text = report::render(&outcome.report);
    assert!(text.contains("No untagged versions found."));
    assert!(text.contains("### Warnings"));
}

#[tokio::test]
async fn retagging_an_already_tagged_list_replans_identically() {
    let d1 = fake_digest(0x11);
    let registry = MockRegistry {
        index: Some(index_of(vec![platform_descriptor(&d1, "linux", "arm64")])),
        ..Default::default()
    };

    let first = tag_manifests(&registry, &test_package(), "v2", false)
        .await
        .unwrap();
    let second = tag_manifests(&registry, &test_package(), "v2", false)
        .await
        .unwrap();

    assert_eq!(first.report.actions, second.report.actions);
    assert_eq!(registry.tagged.lock().unwrap().len(), 2);
}
