//! Registry access for GitHub container packages.
//!
//! Two APIs are involved: the GitHub REST API (listing and deleting package
//! versions) and the GHCR Docker Registry v2 API (fetching manifest lists and
//! assigning tags). The [`Registry`] trait is the boundary the reconciliation
//! engine sees; [`GhcrClient`] is the production implementation.
//!
//! All calls are strictly sequential. Errors carry the registry's response
//! body where one was returned, since the GitHub APIs put the useful
//! diagnostic (rate limits, missing scopes) there.

use oci_spec::image::ImageIndex;
use reqwest::{header, Client, Response};

// Re-exported so Registry implementations and tests can build `RegistryError`
// values without a direct reqwest dependency.
pub use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

const USER_AGENT: &str = concat!("ghcr-reconcile/", env!("CARGO_PKG_VERSION"));
const API_BASE: &str = "https://api.github.com";
const REGISTRY_BASE: &str = "https://ghcr.io";
const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;

/// Accept header covering both OCI and Docker manifest list flavours, plus
/// plain manifests so that re-tagging by digest works for any entry.
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
    application/vnd.docker.distribution.manifest.list.v2+json, \
    application/vnd.oci.image.manifest.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("invalid manifest list: {0}")]
    Manifest(#[from] oci_spec::OciSpecError),
}

/// The account owning a package. GitHub exposes organization- and user-owned
/// packages through different API paths, so the distinction is kept explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Organization(String),
    User(String),
}

impl Account {
    pub fn name(&self) -> &str {
        match self {
            Account::Organization(name) | Account::User(name) => name,
        }
    }
}

/// Coordinates of the package a run operates on.
#[derive(Debug, Clone)]
pub struct Package {
    pub account: Account,
    pub package_type: String,
    pub name: String,
}

impl Package {
    /// The GHCR repository path for this package. Registry repositories are
    /// always lowercase even when the owning account is not.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.account.name(), self.name).to_lowercase()
    }
}

/// One row of the GitHub package-version listing.
///
/// For container packages the version `name` is the manifest digest
/// (`sha256:...`); tags live in the container metadata. The two are exposed
/// separately so that signature matching runs against resolved digests, never
/// against tag strings.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageVersion {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub metadata: VersionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionMetadata {
    #[serde(default)]
    pub container: ContainerMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PackageVersion {
    /// The resolved content digest of this version.
    pub fn digest(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.metadata.container.tags
    }
}

/// Registry operations the reconciliation engine depends on.
///
/// Used generically (never as a trait object) so implementations can stay
/// plain async functions; tests substitute an in-memory mock.
#[allow(async_fn_in_trait)]
pub trait Registry {
    /// List every version of the package, in the registry's listing order.
    async fn list_package_versions(
        &self,
        package: &Package,
    ) -> Result<Vec<PackageVersion>, RegistryError>;

    /// Fetch the manifest list published under `tag`.
    async fn fetch_manifest_list(
        &self,
        package: &Package,
        tag: &str,
    ) -> Result<ImageIndex, RegistryError>;

    /// Delete one package version by its listing identifier.
    async fn delete_package_version(
        &self,
        package: &Package,
        version_id: u64,
    ) -> Result<(), RegistryError>;

    /// Assign `new_tag` to the manifest currently stored under `digest`.
    /// Assignment is an overwrite: re-tagging an already-tagged manifest is
    /// not an error.
    async fn tag_manifest(
        &self,
        package: &Package,
        digest: &str,
        new_tag: &str,
    ) -> Result<(), RegistryError>;
}

/// Production client for GHCR-hosted container packages.
#[derive(Debug)]
pub struct GhcrClient {
    http: Client,
    token: String,
}

#[derive(Deserialize)]
struct RegistryToken {
    token: String,
}

impl GhcrClient {
    pub fn new(token: &str) -> Result<Self, RegistryError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(GhcrClient {
            http,
            token: token.to_owned(),
        })
    }

    /// Check a response status, surfacing the response body on failure.
    async fn check(response: Response) -> Result<Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(RegistryError::Api { status, message })
        }
    }

    fn versions_url(package: &Package) -> String {
        // Container package names may contain '/', which the packages API
        // expects percent-encoded in the path.
        let name = package.name.replace('/', "%2F");
        match &package.account {
            Account::Organization(org) => format!(
                "{API_BASE}/orgs/{org}/packages/{}/{name}/versions",
                package.package_type
            ),
            Account::User(user) => format!(
                "{API_BASE}/users/{user}/packages/{}/{name}/versions",
                package.package_type
            ),
        }
    }

    /// Exchange the GitHub token for a registry bearer token scoped to one
    /// repository.
    async fn registry_token(&self, repository: &str, push: bool) -> Result<String, RegistryError> {
        let actions = if push { "pull,push" } else { "pull" };
        let scope = format!("repository:{repository}:{actions}");
        let response = self
            .http
            .get(format!("{REGISTRY_BASE}/token"))
            .query(&[("service", "ghcr.io"), ("scope", scope.as_str())])
            .basic_auth("token", Some(&self.token))
            .send()
            .await?;
        let token: RegistryToken = Self::check(response).await?.json().await?;
        Ok(token.token)
    }
}

impl Registry for GhcrClient {
    async fn list_package_versions(
        &self,
        package: &Package,
    ) -> Result<Vec<PackageVersion>, RegistryError> {
        let url = Self::versions_url(package);
        let mut versions = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .header(header::ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", API_VERSION)
                .query(&[("per_page", PAGE_SIZE.to_string()), ("page", page.to_string())])
                .send()
                .await?;
            let batch: Vec<PackageVersion> = Self::check(response).await?.json().await?;
            let last_page = batch.len() < PAGE_SIZE;
            versions.extend(batch);
            if last_page {
                return Ok(versions);
            }
            page += 1;
        }
    }

    async fn fetch_manifest_list(
        &self,
        package: &Package,
        tag: &str,
    ) -> Result<ImageIndex, RegistryError> {
        let repository = package.repository();
        let token = self.registry_token(&repository, false).await?;
        let response = self
            .http
            .get(format!("{REGISTRY_BASE}/v2/{repository}/manifests/{tag}"))
            .bearer_auth(&token)
            .header(header::ACCEPT, MANIFEST_ACCEPT)
            .send()
            .await?;
        let body = Self::check(response).await?.bytes().await?;
        Ok(ImageIndex::from_reader(body.as_ref())?)
    }

    async fn delete_package_version(
        &self,
        package: &Package,
        version_id: u64,
    ) -> Result<(), RegistryError> {
        let url = format!("{}/{version_id}", Self::versions_url(package));
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn tag_manifest(
        &self,
        package: &Package,
        digest: &str,
        new_tag: &str,
    ) -> Result<(), RegistryError> {
        let repository = package.repository();
        let token = self.registry_token(&repository, true).await?;

        // Re-tagging is a manifest copy: fetch the raw manifest by digest and
        // put it back under the new tag, preserving the media type.
        let response = self
            .http
            .get(format!("{REGISTRY_BASE}/v2/{repository}/manifests/{digest}"))
            .bearer_auth(&token)
            .header(header::ACCEPT, MANIFEST_ACCEPT)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/vnd.oci.image.manifest.v1+json")
            .to_owned();
        let manifest = response.bytes().await?;

        let response = self
            .http
            .put(format!("{REGISTRY_BASE}/v2/{repository}/manifests/{new_tag}"))
            .bearer_auth(&token)
            .header(header::CONTENT_TYPE, content_type)
            .body(manifest)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_digest_is_separate_from_tags() {
        let version: PackageVersion = serde_json::from_value(serde_json::json!({
            "id": 4711,
            "name": "sha256:5b0bcabd1ed22e9fb1310cf6c2dec7cdef19f0ad69efa1f392e94a4333501270",
            "metadata": {
                "package_type": "container",
                "container": { "tags": ["latest", "v1"] }
            }
        }))
        .unwrap();

        assert_eq!(
            version.digest(),
            "sha256:5b0bcabd1ed22e9fb1310cf6c2dec7cdef19f0ad69efa1f392e94a4333501270"
        );
        assert_eq!(version.tags(), ["latest", "v1"]);
    }

    #[test]
    fn untagged_version_deserializes() {
        let version: PackageVersion = serde_json::from_value(serde_json::json!({
            "id": 4712,
            "name": "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "metadata": { "container": { "tags": [] } }
        }))
        .unwrap();
        assert!(version.tags().is_empty());
    }

    #[test]
    fn versions_url_encodes_slashes_and_selects_account_path() {
        let package = Package {
            account: Account::Organization("acme".into()),
            package_type: "container".into(),
            name: "tools/builder".into(),
        };
        assert_eq!(
            GhcrClient::versions_url(&package),
            "https://api.github.com/orgs/acme/packages/container/tools%2Fbuilder/versions"
        );

        let package = Package {
            account: Account::User("alice".into()),
            ..package
        };
        assert_eq!(
            GhcrClient::versions_url(&package),
            "https://api.github.com/users/alice/packages/container/tools%2Fbuilder/versions"
        );
    }

    #[test]
    fn repository_is_lowercased() {
        let package = Package {
            account: Account::Organization("Acme".into()),
            package_type: "container".into(),
            name: "Builder".into(),
        };
        assert_eq!(package.repository(), "acme/builder");
    }
}
